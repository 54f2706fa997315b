//! Property-based tests for core domain types.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use proptest::prelude::*;

use gitdeck::core::types::{BranchName, ProjectName, RemoteName};
use gitdeck::git::Credentials;

/// Strategy for generating valid project names.
fn valid_project_name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9._-]{0,40}"
}

proptest! {
    #[test]
    fn valid_project_names_roundtrip(name in valid_project_name()) {
        let parsed = ProjectName::new(name.clone()).unwrap();
        prop_assert_eq!(parsed.as_str(), name.as_str());

        let json = serde_json::to_string(&parsed).unwrap();
        let back: ProjectName = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, parsed);
    }

    #[test]
    fn project_names_never_escape_the_workspace(name in "\\PC{0,30}") {
        if let Ok(parsed) = ProjectName::new(name) {
            let s = parsed.as_str();
            prop_assert!(!s.contains('/'));
            prop_assert!(!s.contains('\\'));
            prop_assert!(!s.starts_with('.'));
            prop_assert!(!s.is_empty());
        }
    }

    #[test]
    fn remote_names_have_no_slash(name in "[a-z/]{1,12}") {
        let parsed = RemoteName::new(name.clone());
        if name.contains('/') {
            prop_assert!(parsed.is_err());
        }
    }

    #[test]
    fn branch_names_reject_git_specials(
        prefix in "[a-z]{1,8}",
        special in prop::sample::select(vec!["..", "@{", " ", "~", "^", ":", "?", "*", "["]),
    ) {
        let name = format!("{prefix}{special}x");
        prop_assert!(BranchName::new(name).is_err());
    }

    #[test]
    fn credentials_roundtrip_through_secret_form(
        username in "[a-z][a-z0-9]{0,15}",
        token in "[A-Za-z0-9:_-]{0,40}",
    ) {
        let creds = Credentials { username: username.clone(), token: token.clone() };
        let parsed = Credentials::parse(&creds.to_secret()).unwrap();
        prop_assert_eq!(parsed.username, username);
        prop_assert_eq!(parsed.token, token);
    }
}
