//! Integration tests for CLI commands
//!
//! Only commands that work without a cluster are exercised here.

use std::process::Command;

/// Helper to run fleetdeck command
fn fleetdeck(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_fleetdeck"))
        .args(args)
        .env("FLEETDECK_CONFIG", format!("{}/config.yaml", fixtures_path()))
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute fleetdeck")
}

/// Get the fixtures path
fn fixtures_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures")
}

fn fixture(name: &str) -> String {
    format!("{}/{}", fixtures_path(), name)
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("Output should be valid JSON")
}

mod resolve_command {
    use super::*;

    fn resolve(extra: &[&str]) -> std::process::Output {
        let plugin = fixture("plugin.yaml");
        let definition = fixture("definition.yaml");
        let defaults = fixture("defaults.yaml");
        let secrets = fixture("secrets.yaml");
        let mut args = vec![
            "resolve",
            plugin.as_str(),
            "--definition",
            definition.as_str(),
            "--defaults",
            defaults.as_str(),
            "--secrets-file",
            secrets.as_str(),
        ];
        args.extend_from_slice(extra);
        fleetdeck(&args)
    }

    #[test]
    fn test_resolve_builds_tree() {
        let output = resolve(&["--json"]);
        assert!(
            output.status.success(),
            "resolve failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        let tree = stdout_json(&output);
        assert_eq!(tree["global"]["region"], "eu-1");
        assert_eq!(tree["key1"], "pluginValue1");
        assert_eq!(tree["auth"]["password"], "hunter2");
        assert_eq!(tree["ingress"]["host"], "eu-1.example.com");
        assert_eq!(tree["replicas"], 3);
        assert_eq!(tree["logLevel"], "info");
        assert_eq!(tree["image"]["tag"], "1.10.0");
    }

    #[test]
    fn test_resolve_yaml_output() {
        let output = resolve(&[]);
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("key1: pluginValue1"));
        assert!(stdout.contains("host: eu-1.example.com"));
    }

    #[test]
    fn test_resolve_export_keeps_secrets_out() {
        let output = resolve(&["--export", "--json"]);
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(!stdout.contains("hunter2"));

        let export = stdout_json(&output);
        assert_eq!(export["values"]["key1"], "pluginValue1");
        assert!(export["values"].get("auth").is_none());
        assert_eq!(
            export["valuesFrom"],
            serde_json::json!([{
                "path": "auth.password",
                "secretName": "db-credentials",
                "key": "password"
            }])
        );
    }

    #[test]
    fn test_resolve_missing_required_option() {
        let output = fleetdeck(&[
            "resolve",
            &fixture("plugin-incomplete.yaml"),
            "--definition",
            &fixture("definition.yaml"),
        ]);

        assert_eq!(output.status.code(), Some(2));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("auth.password"));
    }

    #[test]
    fn test_resolve_rejects_mistyped_literal() {
        let output = fleetdeck(&[
            "resolve",
            &fixture("plugin-bad-replicas.yaml"),
            "--definition",
            &fixture("definition.yaml"),
        ]);

        assert_eq!(output.status.code(), Some(2));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("replicas"));
    }

    #[test]
    fn test_resolve_missing_plugin_file() {
        let output = fleetdeck(&["resolve", &fixture("does-not-exist.yaml")]);
        assert_eq!(output.status.code(), Some(5));
    }
}

mod checksum_command {
    use super::*;

    fn checksum(name: &str) -> String {
        let output = fleetdeck(&["checksum", &fixture(name)]);
        assert!(output.status.success());
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    #[test]
    fn test_checksum_is_hex_sha256() {
        let sum = checksum("plugin.yaml");
        assert_eq!(sum.len(), 64);
        assert!(sum.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_checksum_ignores_order() {
        assert_eq!(checksum("plugin.yaml"), checksum("plugin-reordered.yaml"));
    }

    #[test]
    fn test_checksum_changes_with_values() {
        assert_ne!(checksum("plugin.yaml"), checksum("plugin-incomplete.yaml"));
    }
}

mod eval_command {
    use super::*;

    fn eval(args: &[&str]) -> String {
        let mut full = vec!["eval"];
        full.extend_from_slice(args);
        let output = fleetdeck(&full);
        assert!(
            output.status.success(),
            "eval failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    #[test]
    fn test_eval_single_resource() {
        let data = fixture("resource.yaml");
        assert_eq!(
            eval(&["plugin.spec.replicas > 2 && plugin.spec.enabled", "-f", &data]),
            "true"
        );
    }

    #[test]
    fn test_eval_resource_list() {
        let data = fixture("resources.yaml");
        assert_eq!(
            eval(&[
                "plugins.filter(p, p.spec.enabled).size()",
                "-f",
                &data,
                "--list"
            ]),
            "2"
        );
    }

    #[test]
    fn test_eval_platform_values() {
        let data = fixture("values.yaml");
        assert_eq!(
            eval(&["global.region.upperAscii()", "-f", &data, "--global"]),
            "\"EU-1\""
        );
    }

    #[test]
    fn test_eval_global_binds_tree_key() {
        let data = fixture("values.yaml");
        assert_eq!(eval(&["global.tls.enabled", "-f", &data, "--global"]), "true");
    }

    #[test]
    fn test_eval_global_needs_values_tree() {
        let output = fleetdeck(&[
            "eval",
            "global.region",
            "-f",
            &fixture("resources.yaml"),
            "--global",
        ]);
        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_eval_list_needs_sequence() {
        let output = fleetdeck(&["eval", "plugins.size()", "-f", &fixture("resource.yaml"), "--list"]);
        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_eval_invalid_expression() {
        let output = fleetdeck(&["eval", "plugin.spec.(", "-f", &fixture("resource.yaml")]);
        assert!(!output.status.success());
    }
}

mod placeholder_command {
    use super::*;

    #[test]
    fn test_placeholder_resolution() {
        let output = fleetdeck(&[
            "placeholder",
            &fixture("placeholder.yaml"),
            "-f",
            &fixture("values.yaml"),
        ]);
        assert!(
            output.status.success(),
            "placeholder failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        assert_eq!(
            stdout_json(&output),
            serde_json::json!({
                "username": "svc-eu-1",
                "zone": "EU-1",
                "tls": {"enabled": true}
            })
        );
    }

    #[test]
    fn test_placeholder_unknown_reference_fails() {
        // No values: `global` is empty
        let output = fleetdeck(&["placeholder", &fixture("placeholder.yaml")]);
        assert_eq!(output.status.code(), Some(3));
    }
}

mod template_command {
    use super::*;

    #[test]
    fn test_template_inline() {
        let output = fleetdeck(&[
            "template",
            "{{ global.region }}.example.com",
            "-f",
            &fixture("values.yaml"),
        ]);
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "eu-1.example.com");
    }

    #[test]
    fn test_template_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.tpl");
        std::fs::write(&path, "{{ global.region | upper }}").unwrap();

        let output = fleetdeck(&[
            "template",
            &format!("@{}", path.display()),
            "-f",
            &fixture("values.yaml"),
        ]);
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "EU-1");
    }

    #[test]
    fn test_template_syntax_error() {
        let output = fleetdeck(&["template", "{{ global.region "]);
        assert_eq!(output.status.code(), Some(3));
    }
}

mod diff_command {
    use super::*;

    #[test]
    fn test_diff_identical_manifests() {
        let prior = fixture("prior.yaml");
        let output = fleetdeck(&["diff", &prior, "--rendered", &prior]);
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("no differences"));
    }

    #[test]
    fn test_diff_reports_changed_objects() {
        let output = fleetdeck(&[
            "diff",
            &fixture("prior.yaml"),
            "--rendered",
            &fixture("rendered.yaml"),
        ]);
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("ConfigMap/settings"));
        assert!(stdout.contains("Secret/credentials"));
        assert!(stdout.contains("us-2"));
    }

    #[test]
    fn test_diff_never_prints_secret_data() {
        for extra in [&[][..], &["--unified"][..], &["--json"][..]] {
            let mut args = vec![
                "diff".to_string(),
                fixture("prior.yaml"),
                "--rendered".to_string(),
                fixture("rendered.yaml"),
            ];
            args.extend(extra.iter().map(|s| s.to_string()));
            let args: Vec<&str> = args.iter().map(String::as_str).collect();

            let output = fleetdeck(&args);
            assert!(output.status.success());
            let stdout = String::from_utf8_lossy(&output.stdout);
            assert!(!stdout.contains("dGVzdC12YWx1ZQ=="), "old secret leaked: {extra:?}");
            assert!(!stdout.contains("bmV3LXZhbHVlCg=="), "new secret leaked: {extra:?}");
        }
    }

    #[test]
    fn test_diff_json_output() {
        let output = fleetdeck(&[
            "diff",
            &fixture("prior.yaml"),
            "--rendered",
            &fixture("rendered.yaml"),
            "--json",
        ]);
        assert!(output.status.success());

        let records = stdout_json(&output);
        let records = records.as_array().expect("a list of records");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r["kind"] == "changed"));
        assert!(
            records
                .iter()
                .any(|r| r["key"]["kind"] == "Secret" && r["after"]["data"]["test"] == "*** (after)")
        );
    }

    #[test]
    fn test_diff_exit_code_on_drift() {
        let output = fleetdeck(&[
            "diff",
            &fixture("prior.yaml"),
            "--rendered",
            &fixture("rendered.yaml"),
            "--exit-code",
        ]);
        assert_eq!(output.status.code(), Some(8));
    }

    #[test]
    fn test_diff_exit_code_without_drift() {
        let prior = fixture("prior.yaml");
        let output = fleetdeck(&["diff", &prior, "--rendered", &prior, "--exit-code"]);
        assert_eq!(output.status.code(), Some(0));
    }

    #[test]
    fn test_diff_against_release_record() {
        let output = fleetdeck(&[
            "diff",
            &fixture("prior-release.yaml"),
            "--rendered",
            &fixture("rendered.yaml"),
            "--namespace",
            "ingress",
            "--json",
        ]);
        assert!(
            output.status.success(),
            "diff failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        let records = stdout_json(&output);
        let labels: Vec<String> = records
            .as_array()
            .unwrap()
            .iter()
            .map(|r| format!("{}/{}", r["key"]["kind"].as_str().unwrap(), r["key"]["name"].as_str().unwrap()))
            .collect();
        assert_eq!(labels, vec!["ConfigMap/settings", "Secret/credentials"]);
    }

    #[test]
    fn test_diff_rendered_chart() {
        let output = fleetdeck(&[
            "diff",
            &fixture("prior.yaml"),
            "--chart",
            &fixture("chart"),
            "-f",
            &fixture("values.yaml"),
        ]);
        assert!(
            output.status.success(),
            "diff failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        assert!(String::from_utf8_lossy(&output.stdout).contains("no differences"));
    }

    #[test]
    fn test_diff_needs_a_local_side() {
        let output = fleetdeck(&["diff", &fixture("prior.yaml")]);
        assert!(!output.status.success());
    }
}

mod config {
    use super::*;

    #[test]
    fn test_missing_explicit_config_fails() {
        let output = fleetdeck(&[
            "checksum",
            &fixture("plugin.yaml"),
            "--config",
            &fixture("no-such-config.yaml"),
        ]);
        assert!(!output.status.success());
    }

    #[test]
    fn test_diff_indent_from_config() {
        let output = fleetdeck(&[
            "diff",
            &fixture("prior.yaml"),
            "--rendered",
            &fixture("rendered.yaml"),
        ]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.lines().any(|l| l.starts_with("  {")));
        assert!(!stdout.lines().any(|l| l.starts_with("    {")));
    }
}
