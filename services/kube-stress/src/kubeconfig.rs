//! Kubeconfig loading.
//!
//! Only what is needed to reach a single API server is resolved: the server
//! URL, how to trust it, and a bearer token. Client certificates and exec
//! credential plugins are not supported.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use serde::Deserialize;
use stress_common::{StressError, StressResult};
use tracing::debug;

/// Connection settings for one API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kubeconfig {
    pub server: String,
    pub insecure_skip_tls_verify: bool,
    /// PEM encoded CA bundle to trust in addition to the system roots
    pub ca_pem: Option<Vec<u8>>,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct KubeconfigFile {
    #[serde(default)]
    current_context: Option<String>,
    #[serde(default)]
    clusters: Vec<Named<Cluster>>,
    #[serde(default)]
    contexts: Vec<Named<Context>>,
    #[serde(default)]
    users: Vec<Named<User>>,
}

#[derive(Debug, Deserialize)]
struct Named<T> {
    name: String,
    #[serde(alias = "cluster", alias = "context", alias = "user")]
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Cluster {
    server: String,
    #[serde(default)]
    insecure_skip_tls_verify: bool,
    #[serde(default)]
    certificate_authority: Option<PathBuf>,
    #[serde(default)]
    certificate_authority_data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Context {
    cluster: String,
    #[serde(default)]
    user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct User {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    token_file: Option<PathBuf>,
}

impl Kubeconfig {
    /// Connect to `server` directly, e.g. through `kubectl proxy`.
    pub fn for_server(server: impl Into<String>, token: Option<String>) -> Self {
        Self {
            server: server.into(),
            insecure_skip_tls_verify: false,
            ca_pem: None,
            token,
        }
    }

    /// `$KUBECONFIG` if set, else `$HOME/.kube/config`.
    pub fn default_path() -> StressResult<PathBuf> {
        if let Some(path) = std::env::var_os("KUBECONFIG").filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".kube").join("config"))
            .ok_or_else(|| {
                StressError::Kubeconfig("neither KUBECONFIG nor HOME is set".to_string())
            })
    }

    /// Load the current context of the kubeconfig at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> StressResult<Self> {
        Self::from_file_with_context(path, None)
    }

    /// Load `context` from the kubeconfig at `path`, falling back to its
    /// current context.
    pub fn from_file_with_context(
        path: impl AsRef<Path>,
        context: Option<&str>,
    ) -> StressResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StressError::Kubeconfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml(&content, context, base_dir)
    }

    /// Resolve `context` (or the current context) from kubeconfig YAML.
    ///
    /// Relative file references are resolved against `base_dir`.
    pub fn from_yaml(content: &str, context: Option<&str>, base_dir: &Path) -> StressResult<Self> {
        let file: KubeconfigFile = serde_yaml::from_str(content)
            .map_err(|e| StressError::Kubeconfig(format!("invalid kubeconfig: {}", e)))?;

        let context_name = context
            .map(str::to_string)
            .or(file.current_context)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| StressError::Kubeconfig("no current-context set".to_string()))?;

        let context = find(&file.contexts, &context_name, "context")?;
        let cluster = find(&file.clusters, &context.cluster, "cluster")?;
        let user = match &context.user {
            Some(name) => Some(find(&file.users, name, "user")?),
            None => None,
        };

        debug!(context = %context_name, server = %cluster.server, "Resolved kubeconfig context");

        let ca_pem = match (&cluster.certificate_authority_data, &cluster.certificate_authority) {
            (Some(data), _) => Some(
                base64::engine::general_purpose::STANDARD
                    .decode(data.trim())
                    .map_err(|e| {
                        StressError::Kubeconfig(format!("invalid certificate-authority-data: {}", e))
                    })?,
            ),
            (None, Some(file)) => Some(read_relative(base_dir, file, "certificate-authority")?),
            (None, None) => None,
        };

        let token = match user {
            Some(User {
                token: Some(token), ..
            }) => Some(token.clone()),
            Some(User {
                token_file: Some(file),
                ..
            }) => {
                let raw = read_relative(base_dir, file, "tokenFile")?;
                Some(String::from_utf8_lossy(&raw).trim().to_string())
            }
            _ => None,
        };

        Ok(Self {
            server: cluster.server.clone(),
            insecure_skip_tls_verify: cluster.insecure_skip_tls_verify,
            ca_pem,
            token,
        })
    }
}

fn find<'a, T>(entries: &'a [Named<T>], name: &str, what: &str) -> StressResult<&'a T> {
    entries
        .iter()
        .find(|e| e.name == name)
        .map(|e| &e.value)
        .ok_or_else(|| StressError::Kubeconfig(format!("{} '{}' not found", what, name)))
}

fn read_relative(base_dir: &Path, file: &Path, what: &str) -> StressResult<Vec<u8>> {
    let path = if file.is_absolute() {
        file.to_path_buf()
    } else {
        base_dir.join(file)
    };
    std::fs::read(&path).map_err(|e| {
        StressError::Kubeconfig(format!("failed to read {} {}: {}", what, path.display(), e))
    })
}
