//! Host detection used to tune playback defaults

use std::fs;
use tracing::debug;

const DEVICE_TREE_MODEL: &str = "/proc/device-tree/model";
const CPUINFO: &str = "/proc/cpuinfo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostProfile {
    RaspberryPi { model: String },
    Desktop,
}

/// Look at the device tree and cpuinfo to decide what we are running on
pub fn detect_host() -> HostProfile {
    let model = fs::read_to_string(DEVICE_TREE_MODEL)
        .ok()
        .and_then(|s| pi_model_from_device_tree(&s))
        .or_else(|| {
            fs::read_to_string(CPUINFO)
                .ok()
                .and_then(|s| pi_model_from_cpuinfo(&s))
        });

    match model {
        Some(model) => {
            debug!("Detected {}", model);
            HostProfile::RaspberryPi { model }
        }
        None => HostProfile::Desktop,
    }
}

/// `/proc/device-tree/model` is a NUL-terminated string
fn pi_model_from_device_tree(contents: &str) -> Option<String> {
    let model = contents.trim_end_matches('\0').trim();
    model
        .contains("Raspberry Pi")
        .then(|| model.to_string())
}

fn pi_model_from_cpuinfo(contents: &str) -> Option<String> {
    if !contents.contains("Raspberry Pi") {
        return None;
    }
    let model = contents
        .lines()
        .find(|line| line.starts_with("Model"))
        .and_then(|line| line.split_once(':'))
        .map(|(_, value)| value.trim().to_string())
        .unwrap_or_else(|| "Raspberry Pi".to_string());
    Some(model)
}
