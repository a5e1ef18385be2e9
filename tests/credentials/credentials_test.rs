//! Coverage for credential loading and permission checks.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use formrelay::credentials::{
    load_credentials, restrict_to_owner, Credentials, JIRA_API_TOKEN, JIRA_EMAIL,
    SLACK_APP_TOKEN, SLACK_BOT_TOKEN,
};

const FULL_ENV: &str = "SLACK_BOT_TOKEN=xoxb-test\nSLACK_APP_TOKEN=xapp-test\nJIRA_EMAIL=bot@acme.com\nJIRA_API_TOKEN=jira-secret\n";

fn temp_env_path() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("formrelay_test_{}", uuid::Uuid::new_v4()));
    let create = fs::create_dir_all(&dir);
    assert!(create.is_ok());
    dir.join(".env")
}

#[test]
fn loads_env_credentials() {
    let env_path = temp_env_path();
    let write = fs::write(&env_path, FULL_ENV);
    assert!(write.is_ok());
    let perms = restrict_to_owner(&env_path);
    assert!(perms.is_ok());

    let credentials = match load_credentials(&env_path) {
        Ok(credentials) => credentials,
        Err(err) => panic!("credentials should load: {err}"),
    };

    assert_eq!(credentials.get(SLACK_BOT_TOKEN), Some("xoxb-test"));
    assert_eq!(credentials.get(JIRA_EMAIL), Some("bot@acme.com"));
    assert!(credentials.require_all().is_ok());
}

#[cfg(unix)]
#[test]
fn rejects_world_readable_env_file() {
    use std::os::unix::fs::PermissionsExt;

    let env_path = temp_env_path();
    let write = fs::write(&env_path, FULL_ENV);
    assert!(write.is_ok());

    let perms = fs::set_permissions(&env_path, fs::Permissions::from_mode(0o644));
    assert!(perms.is_ok());

    let err = match load_credentials(&env_path) {
        Ok(_) => panic!("world-readable file should not load"),
        Err(err) => err.to_string(),
    };
    assert!(err.contains("644"));
    assert!(err.contains("chmod 600"));
}

#[test]
fn malformed_line_is_an_error() {
    let env_path = temp_env_path();
    let write = fs::write(&env_path, "SLACK_BOT_TOKEN=xoxb-test
this is not an assignment
");
    assert!(write.is_ok());
    assert!(restrict_to_owner(&env_path).is_ok());

    let err = match load_credentials(&env_path) {
        Ok(_) => panic!("malformed file should not load"),
        Err(err) => err.to_string(),
    };
    assert!(err.contains("malformed entry"));
}

#[test]
fn missing_file_is_an_error() {
    let loaded = load_credentials(&temp_env_path());
    let err = match loaded {
        Ok(_) => panic!("absent file should not load"),
        Err(err) => err,
    };
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn require_all_names_every_missing_key() {
    let mut vars = BTreeMap::new();
    vars.insert(SLACK_BOT_TOKEN.to_owned(), "xoxb-test".to_owned());
    vars.insert(JIRA_EMAIL.to_owned(), "   ".to_owned());
    let credentials = Credentials::from_map(vars);

    assert_eq!(
        credentials.missing_required(),
        vec![SLACK_APP_TOKEN, JIRA_EMAIL, JIRA_API_TOKEN]
    );
    let err = match credentials.require_all() {
        Ok(()) => panic!("incomplete credentials should fail"),
        Err(err) => err.to_string(),
    };
    assert!(err.contains("SLACK_APP_TOKEN"));
    assert!(err.contains("JIRA_API_TOKEN"));
    assert!(credentials.require(JIRA_EMAIL).is_err());
}

#[test]
fn debug_output_redacts_values() {
    let mut vars = BTreeMap::new();
    vars.insert(JIRA_API_TOKEN.to_owned(), "jira-secret".to_owned());
    let debug = format!("{:?}", Credentials::from_map(vars));

    assert!(debug.contains("JIRA_API_TOKEN"));
    assert!(!debug.contains("jira-secret"));
}
