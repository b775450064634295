//! Wire shapes returned by the Smartlogic API.

use serde::Deserialize;

/// Response of the changes query: a graph of changesets.
#[derive(Debug, Deserialize)]
pub struct Graph {
    #[serde(rename = "@graph", default)]
    pub changesets: Vec<Changeset>,
}

/// One changeset, referencing the concepts it touched.
#[derive(Debug, Deserialize)]
pub struct Changeset {
    #[serde(rename = "sem:about", default)]
    pub concepts: Vec<ChangedConcept>,
}

/// Reference to a changed concept by IRI.
#[derive(Debug, Deserialize)]
pub struct ChangedConcept {
    #[serde(rename = "@id", default)]
    pub uri: String,
}

/// Response of the credentials endpoint. Only `access_token` is used; an
/// absent field decodes to the empty string.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
}

/// Minimal view of a concept response, used only to recognize the store's
/// "concept does not exist" shape: an object carrying an empty `@graph`.
#[derive(Debug, Deserialize)]
pub struct ConceptGraph {
    #[serde(rename = "@graph")]
    pub graph: Option<Vec<serde_json::Value>>,
}
