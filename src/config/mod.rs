use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, Context};

const CRM_NAMESPACE: &str = "http://www.cidoc-crm.org/cidoc-crm/";
const RDFS_NAMESPACE: &str = "http://www.w3.org/2000/01/rdf-schema#";
const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default = "default_delimited_data_dir")]
    pub delimited_data_dir: PathBuf,
    #[serde(default = "default_rdf_data_dir")]
    pub rdf_data_dir: PathBuf,
    /// Base for every minted entity and appellation IRI.
    #[serde(default = "default_resource_namespace")]
    pub resource_namespace: String,
    #[serde(default)]
    pub vocabulary: Vocabulary,
    #[serde(default = "default_literature_search_prefix")]
    pub literature_search_prefix: String,
    #[serde(default = "default_picture_placeholder")]
    pub picture_placeholder: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_quote")]
    pub quote: char,
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    #[serde(default = "default_crm_namespace")]
    pub crm_namespace: String,
    #[serde(default = "default_rdfs_namespace")]
    pub rdfs_namespace: String,
}

fn default_delimited_data_dir() -> PathBuf { PathBuf::from("data/delimited") }
fn default_rdf_data_dir() -> PathBuf { PathBuf::from("data/rdf") }
fn default_resource_namespace() -> String { "https://www.researchspace.org/resource/".to_string() }
fn default_literature_search_prefix() -> String {
    "https://www.jstor.org/action/doBasicSearch?Query=".to_string()
}
fn default_picture_placeholder() -> String {
    "https://www.researchspace.org/images/sample-image.png".to_string()
}
fn default_delimiter() -> char { '|' }
fn default_quote() -> char { '"' }
fn default_max_input_bytes() -> u64 { 64 * 1024 * 1024 }
fn default_crm_namespace() -> String { CRM_NAMESPACE.to_string() }
fn default_rdfs_namespace() -> String { RDFS_NAMESPACE.to_string() }

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            crm_namespace: default_crm_namespace(),
            rdfs_namespace: default_rdfs_namespace(),
        }
    }
}

impl Vocabulary {
    pub fn rdf_type(&self) -> String { RDF_TYPE.to_string() }
    pub fn label(&self) -> String { format!("{}label", self.rdfs_namespace) }
    pub fn crm_entity(&self) -> String { self.crm("E1_CRM_Entity") }
    pub fn appellation(&self) -> String { self.crm("E41_Appellation") }
    pub fn has_note(&self) -> String { self.crm("P3_has_note") }
    pub fn has_type(&self) -> String { self.crm("P2_has_type") }
    pub fn has_symbolic_content(&self) -> String { self.crm("P190_has_symbolic_content") }
    pub fn is_documented_in(&self) -> String { self.crm("P70i_is_documented_in") }
    pub fn has_representation(&self) -> String { self.crm("P138i_has_representation") }

    fn crm(&self, local: &str) -> String {
        format!("{}{}", self.crm_namespace, local)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            delimited_data_dir: default_delimited_data_dir(),
            rdf_data_dir: default_rdf_data_dir(),
            resource_namespace: default_resource_namespace(),
            vocabulary: Vocabulary::default(),
            literature_search_prefix: default_literature_search_prefix(),
            picture_placeholder: default_picture_placeholder(),
            delimiter: default_delimiter(),
            quote: default_quote(),
            max_input_bytes: default_max_input_bytes(),
            timeout_secs: None,
        }
    }
}

impl Configuration {
    /// Load configuration from a YAML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.resource_namespace.is_empty() {
            anyhow::bail!("No resource namespace defined");
        }

        if !self.resource_namespace.ends_with('/') && !self.resource_namespace.ends_with('#') {
            anyhow::bail!(
                "Resource namespace must end with '/' or '#': {}",
                self.resource_namespace
            );
        }

        if self.delimited_data_dir.as_os_str().is_empty() || self.rdf_data_dir.as_os_str().is_empty() {
            anyhow::bail!("Data directories must not be empty");
        }

        for (name, iri) in [
            ("literature_search_prefix", &self.literature_search_prefix),
            ("picture_placeholder", &self.picture_placeholder),
            ("vocabulary.crm_namespace", &self.vocabulary.crm_namespace),
            ("vocabulary.rdfs_namespace", &self.vocabulary.rdfs_namespace),
        ] {
            if !iri.starts_with("http://") && !iri.starts_with("https://") {
                anyhow::bail!("{} is not an absolute http(s) IRI: {}", name, iri);
            }
        }

        if !self.delimiter.is_ascii() || !self.quote.is_ascii() {
            anyhow::bail!("Delimiter and quote must be single ASCII characters");
        }

        if self.max_input_bytes == 0 {
            anyhow::bail!("max_input_bytes must be greater than zero");
        }

        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Create an example configuration
    pub fn example() -> Self {
        Configuration {
            delimited_data_dir: PathBuf::from("/srv/researchspace/data/delimited"),
            rdf_data_dir: PathBuf::from("/srv/researchspace/data/rdf"),
            timeout_secs: Some(300),
            ..Default::default()
        }
    }
}
