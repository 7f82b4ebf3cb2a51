//! Option value resolution
//!
//! Turns chart defaults, declared option defaults and a plugin's option
//! values into the configuration tree handed to the chart. Later sources win
//! at the same path:
//!
//! 1. chart defaults
//! 2. declared option defaults, for options the plugin does not set
//! 3. the plugin's option values, in order; secrets are fetched, templates
//!    and expressions are evaluated against the tree built so far
//!
//! The flat `name -> value` list is expanded on `.` into a nested tree and
//! merged over the chart defaults.

use std::sync::Arc;
use std::time::Duration;

use fleetdeck_core::{CoreError, OptionValue, PluginOption, SecretKeyRef, ValueSource, Values};
use fleetdeck_engine::{PlatformEvaluator, TemplateResolver, ValueEvaluator};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{KubeError, Result, within};
use crate::secrets::SecretSource;

/// A resolved option value
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntry {
    pub name: String,
    pub value: JsonValue,
    /// Set when the value was read from a secret
    pub secret: Option<SecretKeyRef>,
}

/// A tree path whose value has to come from a secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretValueRef {
    pub path: String,
    pub secret_name: String,
    pub key: String,
}

/// Output of [`ValueResolver::resolve`]
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValues {
    tree: Values,
    defaults: Values,
    entries: Vec<ResolvedEntry>,
}

impl ResolvedValues {
    /// The merged configuration tree
    pub fn tree(&self) -> &Values {
        &self.tree
    }

    pub fn into_tree(self) -> Values {
        self.tree
    }

    /// Flat list the tree was built from, in resolution order
    pub fn entries(&self) -> &[ResolvedEntry] {
        &self.entries
    }

    /// Tree without secret values, plus where each secret belongs
    ///
    /// For delivery backends that read secrets themselves: the tree can be
    /// stored in clear and the references resolved on the other side.
    pub fn declarative_export(&self) -> Result<(Values, Vec<SecretValueRef>)> {
        let plain = self.entries.iter().filter(|e| e.secret.is_none());
        let mut tree = self.defaults.clone();
        tree.merge(&Values::from_flat(plain.map(|e| (e.name.as_str(), &e.value)))?);

        let refs = self
            .entries
            .iter()
            .filter_map(|e| {
                e.secret.as_ref().map(|s| SecretValueRef {
                    path: e.name.clone(),
                    secret_name: s.name.clone(),
                    key: s.key.clone(),
                })
            })
            .collect();

        Ok((tree, refs))
    }
}

/// Resolves option values into a configuration tree
pub struct ValueResolver {
    secrets: Arc<dyn SecretSource>,
    template: Arc<dyn ValueEvaluator>,
    expression: Arc<dyn ValueEvaluator>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for ValueResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueResolver")
            .field("template", &self.template.name())
            .field("expression", &self.expression.name())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ValueResolver {
    /// Templates go through a [`TemplateResolver`], expressions through the
    /// shared platform evaluator
    pub fn new(secrets: Arc<dyn SecretSource>, platform: Arc<PlatformEvaluator>) -> Self {
        Self {
            secrets,
            template: Arc::new(TemplateResolver::new()),
            expression: platform,
            timeout: None,
        }
    }

    pub fn with_template_evaluator(mut self, evaluator: Arc<dyn ValueEvaluator>) -> Self {
        self.template = evaluator;
        self
    }

    pub fn with_expression_evaluator(mut self, evaluator: Arc<dyn ValueEvaluator>) -> Self {
        self.expression = evaluator;
        self
    }

    /// Bound each secret fetch
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the configuration tree
    pub async fn resolve(
        &self,
        chart_defaults: &Values,
        options: &[PluginOption],
        option_values: &[OptionValue],
    ) -> Result<ResolvedValues> {
        let mut entries: Vec<ResolvedEntry> = Vec::new();

        for option in options {
            let supplied: Vec<&OptionValue> = option_values
                .iter()
                .filter(|v| v.name == option.name)
                .collect();

            if supplied.is_empty() {
                match &option.default {
                    Some(default) => upsert(&mut entries, &option.name, default.clone(), None),
                    None if option.required => {
                        return Err(CoreError::MissingRequiredOption {
                            name: option.name.clone(),
                        }
                        .into());
                    }
                    None => {}
                }
                continue;
            }

            for literal in supplied.iter().filter_map(|v| v.literal_value()) {
                option.check_value(literal)?;
            }
        }

        for option_value in option_values {
            let (value, secret) = self
                .resolve_one(chart_defaults, &entries, option_value)
                .await
                .map_err(|e| KubeError::OptionValue {
                    name: option_value.name.clone(),
                    source_kind: option_value.source.kind(),
                    source: Box::new(e),
                })?;
            upsert(&mut entries, &option_value.name, value, secret);
        }

        let tree = materialize(chart_defaults, &entries)?;
        debug!(entries = entries.len(), "option values resolved");

        Ok(ResolvedValues {
            tree,
            defaults: chart_defaults.clone(),
            entries,
        })
    }

    async fn resolve_one(
        &self,
        chart_defaults: &Values,
        entries: &[ResolvedEntry],
        option_value: &OptionValue,
    ) -> Result<(JsonValue, Option<SecretKeyRef>)> {
        match &option_value.source {
            ValueSource::Literal(value) => Ok((value.clone(), None)),
            ValueSource::SecretRef(reference) => {
                let value = within(
                    self.timeout,
                    &format!("reading {}", reference),
                    self.secrets.fetch(reference),
                )
                .await?;
                debug!(option = %option_value.name, secret = %reference.name, key = %reference.key, "secret value fetched");
                Ok((JsonValue::String(value), Some(reference.clone())))
            }
            ValueSource::Template(body) => {
                let tree = materialize(chart_defaults, entries)?;
                Ok((self.template.resolve_value(body, &tree)?, None))
            }
            ValueSource::Expression(body) => {
                let tree = materialize(chart_defaults, entries)?;
                Ok((self.expression.resolve_value(body, &tree)?, None))
            }
        }
    }
}

/// Replace any earlier entry of the same name
fn upsert(entries: &mut Vec<ResolvedEntry>, name: &str, value: JsonValue, secret: Option<SecretKeyRef>) {
    entries.retain(|e| e.name != name);
    entries.push(ResolvedEntry {
        name: name.to_string(),
        value,
        secret,
    });
}

/// Chart defaults with the flat entries merged over them
fn materialize(chart_defaults: &Values, entries: &[ResolvedEntry]) -> Result<Values> {
    let mut tree = chart_defaults.clone();
    tree.merge(&Values::from_flat(
        entries.iter().map(|e| (e.name.as_str(), &e.value)),
    )?);
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::StaticSecretSource;
    use async_trait::async_trait;
    use fleetdeck_core::{OptionType, checksum};
    use serde_json::json;

    fn resolver() -> ValueResolver {
        let secrets = StaticSecretSource::new()
            .with_secret("db-credentials", "password", "hunter2")
            .with_secret("api", "token", "t0k3n");
        ValueResolver::new(Arc::new(secrets), Arc::new(PlatformEvaluator::new()))
    }

    #[tokio::test]
    async fn test_option_value_overrides_chart_default() {
        let defaults = Values(json!({"key1": "chartDefault", "key2": "untouched"}));
        let values = vec![OptionValue::literal("key1", json!("pluginValue1"))];

        let resolved = resolver().resolve(&defaults, &[], &values).await.unwrap();
        assert_eq!(resolved.tree().get("key1"), Some(&json!("pluginValue1")));
        assert_eq!(resolved.tree().get("key2"), Some(&json!("untouched")));
    }

    #[tokio::test]
    async fn test_precedence() {
        let defaults = Values(json!({
            "image": {"registry": "chart.io", "tag": "1.0"},
            "replicas": 1
        }));
        let options = vec![
            PluginOption::new("image.registry", OptionType::String).with_default(json!("declared.io")),
            PluginOption::new("replicas", OptionType::Int).with_default(json!(2)),
            PluginOption::new("logLevel", OptionType::String).with_default(json!("info")),
        ];
        let values = vec![OptionValue::literal("replicas", json!(5))];

        let resolved = resolver().resolve(&defaults, &options, &values).await.unwrap();
        let tree = resolved.tree();
        assert_eq!(tree.get("image.registry"), Some(&json!("declared.io")));
        assert_eq!(tree.get("image.tag"), Some(&json!("1.0")));
        assert_eq!(tree.get("replicas"), Some(&json!(5)));
        assert_eq!(tree.get("logLevel"), Some(&json!("info")));
    }

    #[tokio::test]
    async fn test_required_option_without_value() {
        let options = vec![PluginOption::new("cluster.name", OptionType::String).required()];
        let err = resolver()
            .resolve(&Values::new(), &options, &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KubeError::Core(CoreError::MissingRequiredOption { ref name }) if name == "cluster.name"
        ));
    }

    #[tokio::test]
    async fn test_literal_type_checked() {
        let options = vec![PluginOption::new("replicas", OptionType::Int)];
        let values = vec![OptionValue::literal("replicas", json!("three"))];
        let err = resolver()
            .resolve(&Values::new(), &options, &values)
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::Core(CoreError::InvalidOptionValue { .. })));
    }

    #[tokio::test]
    async fn test_dynamic_sources() {
        let defaults = Values(json!({"global": {"region": "eu-1", "tier": "gold"}}));
        let values = vec![
            OptionValue::secret("auth.password", "db-credentials", "password"),
            OptionValue::template("ingress.host", "{{ global.region }}.example.com"),
            OptionValue::expression("replicas", "global.tier == 'gold' ? 3 : 1"),
            OptionValue::expression("auth.user", "name: svc-${global.region}"),
        ];

        let resolved = resolver().resolve(&defaults, &[], &values).await.unwrap();
        let tree = resolved.tree();
        assert_eq!(tree.get("auth.password"), Some(&json!("hunter2")));
        assert_eq!(tree.get("ingress.host"), Some(&json!("eu-1.example.com")));
        assert_eq!(tree.get("replicas"), Some(&json!(3)));
        assert_eq!(tree.get("auth.user.name"), Some(&json!("svc-eu-1")));
    }

    #[tokio::test]
    async fn test_templates_see_earlier_values() {
        let values = vec![
            OptionValue::literal("global.region", json!("us-2")),
            OptionValue::template("host", "{{ global.region }}.example.com"),
            OptionValue::template("missing", "{{ global.zone }}"),
        ];
        let resolved = resolver().resolve(&Values::new(), &[], &values).await.unwrap();
        assert_eq!(resolved.tree().get("host"), Some(&json!("us-2.example.com")));
        assert_eq!(resolved.tree().get("missing"), Some(&json!("<no value>")));
    }

    #[tokio::test]
    async fn test_later_entry_replaces_earlier() {
        let values = vec![
            OptionValue::literal("a", json!({"x": 1, "y": 2})),
            OptionValue::literal("a", json!("scalar")),
            OptionValue::literal("b.c", json!(1)),
            OptionValue::literal("b", json!({"d": 2})),
        ];
        let resolved = resolver().resolve(&Values::new(), &[], &values).await.unwrap();
        assert_eq!(resolved.tree().get("a"), Some(&json!("scalar")));
        assert_eq!(resolved.tree().get("b"), Some(&json!({"c": 1, "d": 2})));
        assert_eq!(resolved.entries().len(), 3);
    }

    #[tokio::test]
    async fn test_errors_name_the_option() {
        let values = vec![OptionValue::secret("auth.password", "db-credentials", "nope")];
        let err = resolver().resolve(&Values::new(), &[], &values).await.unwrap_err();
        assert!(err.to_string().contains("auth.password"));
        assert!(matches!(
            err,
            KubeError::OptionValue { source_kind: "secret", .. }
        ));

        let values = vec![OptionValue::expression("x", "global.region +")];
        let err = resolver().resolve(&Values::new(), &[], &values).await.unwrap_err();
        assert!(matches!(err, KubeError::OptionValue { source_kind: "expression", .. }));
    }

    #[tokio::test]
    async fn test_declarative_export() {
        let defaults = Values(json!({"auth": {"enabled": true}}));
        let values = vec![
            OptionValue::literal("auth.user", json!("admin")),
            OptionValue::secret("auth.password", "db-credentials", "password"),
        ];
        let resolved = resolver().resolve(&defaults, &[], &values).await.unwrap();

        let (tree, refs) = resolved.declarative_export().unwrap();
        assert_eq!(tree, Values(json!({"auth": {"enabled": true, "user": "admin"}})));
        assert_eq!(
            refs,
            vec![SecretValueRef {
                path: "auth.password".to_string(),
                secret_name: "db-credentials".to_string(),
                key: "password".to_string(),
            }]
        );
        assert_eq!(resolved.tree().get("auth.password"), Some(&json!("hunter2")));
    }

    struct SlowSecrets;

    #[async_trait]
    impl SecretSource for SlowSecrets {
        async fn fetch(&self, _reference: &SecretKeyRef) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    #[tokio::test]
    async fn test_secret_fetch_timeout() {
        let resolver = ValueResolver::new(Arc::new(SlowSecrets), Arc::new(PlatformEvaluator::new()))
            .with_timeout(Some(Duration::from_millis(20)));
        let values = vec![OptionValue::secret("token", "api", "token")];
        let err = resolver.resolve(&Values::new(), &[], &values).await.unwrap_err();
        assert!(err.is_timeout());
    }

    struct Upper;

    impl ValueEvaluator for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn resolve_value(&self, body: &str, _tree: &Values) -> fleetdeck_engine::Result<JsonValue> {
            Ok(JsonValue::String(body.to_uppercase()))
        }
    }

    #[tokio::test]
    async fn test_pluggable_evaluators() {
        let resolver = resolver().with_template_evaluator(Arc::new(Upper));
        let values = vec![OptionValue::template("shout", "hello")];
        let resolved = resolver.resolve(&Values::new(), &[], &values).await.unwrap();
        assert_eq!(resolved.tree().get("shout"), Some(&json!("HELLO")));
    }

    #[tokio::test]
    async fn test_resolutions_run_on_separate_tasks() {
        let resolver = Arc::new(resolver());
        let handles: Vec<_> = ["eu-1", "us-2"]
            .into_iter()
            .map(|region| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move {
                    let values = vec![
                        OptionValue::literal("global.region", json!(region)),
                        OptionValue::expression("zone", "global.region.upperAscii()"),
                        OptionValue::secret("auth.password", "db-credentials", "password"),
                    ];
                    resolver.resolve(&Values::new(), &[], &values).await
                })
            })
            .collect();

        for (handle, zone) in handles.into_iter().zip(["EU-1", "US-2"]) {
            let resolved = handle.await.unwrap().unwrap();
            assert_eq!(resolved.tree().get("zone"), Some(&json!(zone)));
            assert_eq!(resolved.tree().get("auth.password"), Some(&json!("hunter2")));
        }
    }

    #[tokio::test]
    async fn test_checksum_needs_no_secret_io() {
        let values = vec![
            OptionValue::secret("token", "api", "token"),
            OptionValue::literal("replicas", json!(2)),
        ];
        let mut reversed = values.clone();
        reversed.reverse();
        assert_eq!(checksum(&values), checksum(&reversed));
    }
}
