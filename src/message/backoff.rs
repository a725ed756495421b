use std::time::Duration;

/// An iterator of waiting periods which scales by `factor` until it
/// saturates at `max`, optionally ending after a fixed number of attempts.
/// Drives the connect-retry loop in the TCP transport.
pub struct ExponentialBackoff {
    curr: Duration,
    max: Duration,
    factor: u32,
    iterations: usize,
    max_iterations: Option<usize>,
}

impl ExponentialBackoff {
    pub fn new(
        start: Duration,
        max: Duration,
        factor: u32,
        max_iterations: Option<usize>,
    ) -> ExponentialBackoff {
        ExponentialBackoff {
            curr: start,
            max,
            factor,
            iterations: 0,
            max_iterations,
        }
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.max_iterations.map_or(false, |max| self.iterations >= max) {
            return None;
        }
        self.iterations += 1;
        self.curr = (self.curr * self.factor).min(self.max);
        Some(self.curr)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn backoff_scales_then_saturates() {
        let delays: Vec<_> = ExponentialBackoff::new(
            Duration::from_millis(10),
            Duration::from_millis(50),
            2,
            Some(4),
        )
        .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(20),
                Duration::from_millis(40),
                Duration::from_millis(50),
                Duration::from_millis(50),
            ]
        );
    }
}
