//! Platform strategies.
//!
//! Parsers are plain functions over text so every platform's output can be
//! tested on any host; only [`strategy_for`] picks one at runtime.

mod unix;
mod utils;
mod windows;

pub use unix::UnixStrategy;
pub use windows::WindowsStrategy;

use crate::ports::{Platform, PlatformStrategy};

/// Build the strategy for `platform`.
pub fn strategy_for(platform: Platform) -> Box<dyn PlatformStrategy> {
    match platform {
        Platform::Windows => Box::new(WindowsStrategy::new()),
        Platform::MacOs | Platform::Linux => Box::new(UnixStrategy::new(platform)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_for_platform() {
        for platform in [Platform::MacOs, Platform::Linux, Platform::Windows] {
            assert_eq!(strategy_for(platform).platform(), platform);
        }
        assert_eq!(
            strategy_for(Platform::Windows).kill_command(7).program,
            "taskkill"
        );
        assert_eq!(strategy_for(Platform::Linux).kill_command(7).program, "kill");
    }
}
