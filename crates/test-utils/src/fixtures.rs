//! Common test fixtures for kube-stress tests.

use std::path::{Path, PathBuf};

use stress_common::ListParams;

/// List parameters matching the tool's defaults.
pub fn list_params() -> ListParams {
    ListParams {
        namespace: "kube-stress".to_string(),
        object_type: "configmaps".to_string(),
        page_size: 0,
    }
}

/// Kubeconfig with a single token-authenticated context.
pub const KUBECONFIG_TOKEN: &str = r#"
apiVersion: v1
kind: Config
current-context: stress
clusters:
  - name: stress-cluster
    cluster:
      server: https://127.0.0.1:6443/
      insecure-skip-tls-verify: true
contexts:
  - name: stress
    context:
      cluster: stress-cluster
      user: stress-user
users:
  - name: stress-user
    user:
      token: abc123
"#;

/// Kubeconfig with two contexts, a token file and inline CA data.
///
/// The CA data is base64 of `-----BEGIN CERTIFICATE-----\n`.
pub const KUBECONFIG_MULTI: &str = r#"
apiVersion: v1
kind: Config
current-context: prod
clusters:
  - name: dev-cluster
    cluster:
      server: http://127.0.0.1:8001
  - name: prod-cluster
    cluster:
      server: https://prod.example.com
      certificate-authority-data: LS0tLS1CRUdJTiBDRVJUSUZJQ0FURS0tLS0tCg==
contexts:
  - name: dev
    context:
      cluster: dev-cluster
      user: anonymous
  - name: prod
    context:
      cluster: prod-cluster
      user: prod-user
users:
  - name: anonymous
    user: {}
  - name: prod-user
    user:
      tokenFile: token.txt
"#;

/// Write `contents` to `name` inside `dir`, returning the full path.
pub fn write_fixture(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("failed to write fixture");
    path
}

/// Fresh temporary directory that is removed on drop.
pub fn temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("failed to create temp dir")
}
