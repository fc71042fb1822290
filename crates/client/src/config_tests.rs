use std::collections::HashMap;

use super::*;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name: &str| vars.get(name).cloned()
}

#[test]
fn defaults_apply_when_only_host_is_set() {
    let config = ClientConfig::from_lookup(lookup(&[(ENV_HOST, "cortex.local")]))
        .expect("config failed");

    assert_eq!(config, ClientConfig::new("cortex.local", DEFAULT_PORT));
    assert_eq!(config.endpoint.base_url(), "https://cortex.local:443");
}

#[test]
fn every_variable_is_honoured() {
    let config = ClientConfig::from_lookup(lookup(&[
        (ENV_HOST, " cortex.local "),
        (ENV_PORT, "4443"),
        (ENV_API_KEY, "k3y"),
        (ENV_TIMEOUT_SECS, "5"),
        (ENV_INSECURE, "TRUE"),
    ]))
    .expect("config failed");

    assert_eq!(
        config,
        ClientConfig::new("cortex.local", 4443)
            .with_api_key("k3y")
            .with_timeout(Duration::from_secs(5))
            .with_accept_invalid_certs(true)
    );
}

#[test]
fn empty_values_count_as_unset() {
    let config = ClientConfig::from_lookup(lookup(&[
        (ENV_HOST, "cortex.local"),
        (ENV_PORT, ""),
        (ENV_API_KEY, "   "),
    ]))
    .expect("config failed");

    assert_eq!(config.endpoint.port, DEFAULT_PORT);
    assert_eq!(config.api_key, None);
}

#[yare::parameterized(
    missing_host = { &[] },
    blank_host = { &[(ENV_HOST, "  ")] },
    bad_port = { &[(ENV_HOST, "h"), (ENV_PORT, "https")] },
    port_out_of_range = { &[(ENV_HOST, "h"), (ENV_PORT, "70000")] },
    bad_timeout = { &[(ENV_HOST, "h"), (ENV_TIMEOUT_SECS, "soon")] },
    bad_flag = { &[(ENV_HOST, "h"), (ENV_INSECURE, "maybe")] },
)]
fn invalid_environment_is_a_configuration_error(vars: &[(&str, &str)]) {
    let err = ClientConfig::from_lookup(lookup(vars)).unwrap_err();

    assert!(
        matches!(err, ClientError::Configuration { .. }),
        "got {err:?}"
    );
}

#[test]
fn debug_output_redacts_api_key() {
    let config = ClientConfig::new("h", 1).with_api_key("super-secret");

    let rendered = format!("{config:?}");

    assert!(!rendered.contains("super-secret"));
    assert!(rendered.contains("<redacted>"));
}
