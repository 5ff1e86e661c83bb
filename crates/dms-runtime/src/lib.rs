//! DMS Runtime - Execution strategies for each rule kind

pub mod command;
pub mod cpu;
pub mod file;
pub mod traits;

pub use command::CommandRunner;
pub use cpu::CpuRunner;
pub use file::FileRunner;
pub use traits::RuleRunner;

use dms_core::RuleKind;

/// Get the runner for a rule kind
pub fn get_runner(kind: RuleKind) -> Box<dyn RuleRunner> {
    match kind {
        RuleKind::File => Box::new(FileRunner),
        RuleKind::Command => Box::new(CommandRunner),
        RuleKind::Cpu => Box::new(CpuRunner::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_matches_kind() {
        for kind in [RuleKind::File, RuleKind::Command, RuleKind::Cpu] {
            assert_eq!(get_runner(kind).kind_name(), kind.as_str());
        }
    }
}
