//! Ordered fallback helper
//!
//! Tries candidates in order and stops at the first one that works.

use std::fmt;

/// One failed candidate together with the reason it failed
#[derive(Debug, Clone)]
pub struct FailedAttempt<C, E> {
    pub candidate: C,
    pub error: E,
}

/// Every candidate was tried and none succeeded
#[derive(Debug, Clone)]
pub struct Exhausted<C, E> {
    pub attempts: Vec<FailedAttempt<C, E>>,
}

impl<C, E> Exhausted<C, E> {
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

impl<C: fmt::Debug, E: fmt::Display> fmt::Display for Exhausted<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attempts.is_empty() {
            return write!(f, "no candidates to try");
        }
        write!(f, "all {} candidates failed", self.attempts.len())?;
        for attempt in &self.attempts {
            write!(f, "; {:?}: {}", attempt.candidate, attempt.error)?;
        }
        Ok(())
    }
}

/// Run `attempt` on each candidate in order, returning the first success.
///
/// Each candidate is tried exactly once. If all of them fail, the failures
/// are returned in the order they happened.
pub fn first_success<C, T, E, I, F>(candidates: I, mut attempt: F) -> Result<T, Exhausted<C, E>>
where
    I: IntoIterator<Item = C>,
    F: FnMut(&C) -> Result<T, E>,
{
    let mut attempts = Vec::new();
    for candidate in candidates {
        match attempt(&candidate) {
            Ok(value) => return Ok(value),
            Err(error) => attempts.push(FailedAttempt { candidate, error }),
        }
    }
    Err(Exhausted { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_first_success() {
        let mut seen = Vec::new();
        let result: Result<u32, Exhausted<u32, String>> = first_success([1, 2, 3, 4], |&n| {
            seen.push(n);
            if n >= 3 {
                Ok(n * 10)
            } else {
                Err(format!("{} too small", n))
            }
        });
        assert_eq!(result.unwrap(), 30);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_exhaustion_keeps_order() {
        let result: Result<(), _> = first_success(["a", "b"], |c| Err::<(), _>(c.to_uppercase()));
        let exhausted = result.unwrap_err();
        let order: Vec<_> = exhausted.attempts.iter().map(|a| a.candidate).collect();
        assert_eq!(order, vec!["a", "b"]);
        assert_eq!(exhausted.attempts[1].error, "B");
        assert!(exhausted.to_string().contains("all 2 candidates failed"));
    }

    #[test]
    fn test_empty_candidates() {
        let result: Result<(), Exhausted<u8, String>> = first_success(Vec::new(), |_| Ok(()));
        let exhausted = result.unwrap_err();
        assert!(exhausted.is_empty());
        assert_eq!(exhausted.to_string(), "no candidates to try");
    }
}
