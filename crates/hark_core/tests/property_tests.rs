//! Property-based tests for hark_core.
//!
//! Uses proptest to verify invariants that must hold for ALL possible inputs,
//! not just hand-picked examples.

use hark_core::{
    is_localhost, CommandResult, Credentials, ExecutionOutcome, Level, Report, TransportKind,
};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// "localhost" with every letter independently upper- or lower-cased.
fn arb_localhost_spelling() -> impl Strategy<Value = String> {
    proptest::collection::vec(any::<bool>(), 9).prop_map(|flags| {
        "localhost"
            .chars()
            .zip(flags)
            .map(|(c, upper)| if upper { c.to_ascii_uppercase() } else { c })
            .collect()
    })
}

// ============================================================================
// Routing / data model properties
// ============================================================================

proptest! {
    #[test]
    fn any_casing_of_localhost_is_local(host in arb_localhost_spelling()) {
        prop_assert!(is_localhost(&host));
    }

    #[test]
    fn other_hosts_are_never_local(host in "[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}") {
        prop_assert!(!is_localhost(&host));
    }

    /// Passwords never leak through Debug formatting.
    #[test]
    fn password_never_in_debug(user in "[a-z]{1,12}", password in "[A-Za-z0-9]{8,24}") {
        let creds = Credentials::new(user, password.clone());
        let rendered = format!("{:?}", creds);
        prop_assert!(!rendered.contains(&password));
    }

    /// A refusal always reports exactly one error, carrying the reason verbatim.
    #[test]
    fn refusal_report_carries_reason(reason in "[A-Za-z ,.]{1,60}") {
        let mut report = Report::new();
        report.refusal(&CommandResult::refusal(reason.clone()));
        let errors: Vec<_> = report.messages(Level::Error).collect();
        prop_assert_eq!(errors.len(), 1);
        prop_assert_eq!(errors[0].to_string(), format!("Cannot execute command: {}", reason));
    }

    /// A non-zero exit code is always surfaced as an error, whatever the streams hold.
    #[test]
    fn nonzero_exit_always_reports_error(
        code in 1i32..255,
        stdout in "[a-z \\n]{0,40}",
        stderr in "[a-z \\n]{0,40}",
    ) {
        let mut report = Report::new();
        report.execution(TransportKind::Ssh, &ExecutionOutcome::completed(stdout, stderr, Some(code)));
        prop_assert!(report.has_errors());
    }
}
