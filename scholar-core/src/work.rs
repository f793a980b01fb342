//! OpenAlex work model
//!
//! Typed view over the subset of the OpenAlex `Work` object the toolchain
//! uses. Unknown fields are ignored; every field is optional because
//! OpenAlex omits freely.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const ACM_DOI_PREFIX: &str = "10.1145/";
const SAFE_TITLE_LEN: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Work {
    #[serde(default)]
    pub id: String,
    pub title: Option<String>,
    pub display_name: Option<String>,
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub cited_by_count: u64,
    pub doi: Option<String>,
    #[serde(default)]
    pub authorships: Vec<Authorship>,
    pub open_access: Option<OpenAccess>,
    pub primary_location: Option<Location>,
    #[serde(default)]
    pub locations: Vec<Location>,
    pub abstract_inverted_index: Option<BTreeMap<String, Vec<usize>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Authorship {
    pub author: Option<Author>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenAccess {
    #[serde(default)]
    pub is_oa: bool,
    pub oa_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub is_oa: bool,
    pub landing_page_url: Option<String>,
    pub pdf_url: Option<String>,
    pub source: Option<Source>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub display_name: Option<String>,
    pub host_organization_name: Option<String>,
}

impl Location {
    /// Direct PDF link if present, landing page otherwise
    pub fn best_url(&self) -> Option<&str> {
        non_empty(self.pdf_url.as_deref()).or_else(|| non_empty(self.landing_page_url.as_deref()))
    }

    fn mentions(&self, needle: &str) -> bool {
        let in_url = |u: Option<&str>| u.is_some_and(|u| u.to_ascii_lowercase().contains(needle));
        let in_source = self.source.as_ref().is_some_and(|s| {
            s.display_name
                .as_deref()
                .is_some_and(|n| n.to_ascii_lowercase().contains(needle))
        });
        in_url(self.pdf_url.as_deref()) || in_url(self.landing_page_url.as_deref()) || in_source
    }

    fn is_acm(&self) -> bool {
        let Some(source) = &self.source else {
            return false;
        };
        [&source.display_name, &source.host_organization_name]
            .into_iter()
            .flatten()
            .any(|name| {
                let lower = name.to_ascii_lowercase();
                lower.contains("association for computing machinery")
                    || name.split(|c: char| !c.is_ascii_alphanumeric()).any(|w| w == "ACM")
            })
    }
}

impl Work {
    /// OpenAlex short id, e.g. `W2741809807`
    pub fn short_id(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }

    pub fn display_title(&self) -> &str {
        non_empty(self.title.as_deref())
            .or_else(|| non_empty(self.display_name.as_deref()))
            .unwrap_or("Unknown title")
    }

    /// First `n` author names
    pub fn author_names(&self, n: usize) -> Vec<String> {
        self.authorships
            .iter()
            .filter_map(|a| a.author.as_ref()?.display_name.clone())
            .filter(|name| !name.trim().is_empty())
            .take(n)
            .collect()
    }

    /// Authors for a one-line listing: `A, B, C et al.`
    pub fn authors_line(&self, n: usize) -> String {
        let names = self.author_names(n);
        if names.is_empty() {
            return "Unknown".to_string();
        }
        let mut line = names.join(", ");
        if self.authorships.len() > n {
            line.push_str(" et al.");
        }
        line
    }

    pub fn first_author_surname(&self) -> Option<String> {
        self.author_names(1)
            .first()
            .and_then(|name| name.split_whitespace().last())
            .map(str::to_string)
    }

    /// DOI without the `https://doi.org/` prefix
    pub fn bare_doi(&self) -> Option<&str> {
        let doi = non_empty(self.doi.as_deref())?;
        Some(
            doi.strip_prefix("https://doi.org/")
                .or_else(|| doi.strip_prefix("http://doi.org/"))
                .unwrap_or(doi),
        )
    }

    /// Abstract reconstructed from OpenAlex's inverted index
    pub fn abstract_text(&self) -> Option<String> {
        let index = self.abstract_inverted_index.as_ref()?;
        let mut positioned: Vec<(usize, &str)> = index
            .iter()
            .flat_map(|(word, positions)| positions.iter().map(move |p| (*p, word.as_str())))
            .collect();
        if positioned.is_empty() {
            return None;
        }
        positioned.sort_by_key(|(p, _)| *p);
        Some(
            positioned
                .into_iter()
                .map(|(_, w)| w)
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    /// Whether the work was published by the ACM
    pub fn is_acm(&self) -> bool {
        if self
            .bare_doi()
            .is_some_and(|doi| doi.starts_with(ACM_DOI_PREFIX))
        {
            return true;
        }
        self.primary_location.iter().chain(&self.locations).any(Location::is_acm)
    }

    pub fn is_open_access(&self) -> bool {
        self.open_access.as_ref().is_some_and(|oa| oa.is_oa)
    }

    /// Best open-access download URL
    ///
    /// Order: OpenAlex `oa_url`, arXiv, PubMed, any other open location.
    pub fn pdf_url(&self) -> Option<String> {
        if let Some(url) = self
            .open_access
            .as_ref()
            .and_then(|oa| non_empty(oa.oa_url.as_deref()))
        {
            return Some(url.to_string());
        }

        let all: Vec<&Location> = self.primary_location.iter().chain(&self.locations).collect();

        for repo in ["arxiv", "pubmed"] {
            if let Some(url) = all
                .iter()
                .find(|loc| loc.mentions(repo))
                .and_then(|loc| loc.best_url())
            {
                return Some(url.to_string());
            }
        }

        all.iter()
            .filter(|loc| loc.is_oa)
            .find_map(|loc| loc.best_url())
            .map(str::to_string)
    }

    /// Local filename: `{surname}_{year}_{safe_title}.pdf`
    pub fn pdf_filename(&self) -> String {
        let surname = self
            .first_author_surname()
            .map(|s| sanitize(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let year = self
            .publication_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let title = safe_title(self.display_title());
        let title = if title.is_empty() {
            "unknown".to_string()
        } else {
            title
        };
        format!("{}_{}_{}.pdf", surname, year, title)
    }
}

/// Title reduced to a filesystem-safe stem
pub fn safe_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .take(SAFE_TITLE_LEN)
        .collect();
    kept.trim().replace(' ', "_")
}

fn sanitize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_'))
        .collect()
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

/// OpenAlex list response envelope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorksPage {
    #[serde(default)]
    pub results: Vec<Work>,
    pub meta: Option<WorksMeta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorksMeta {
    pub count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Work {
        serde_json::from_value(json!({
            "id": "https://openalex.org/W2741809807",
            "title": "Attention Is All You Need: Transformers?",
            "publication_year": 2017,
            "cited_by_count": 90000,
            "doi": "https://doi.org/10.5555/3295222.3295349",
            "authorships": [
                {"author": {"display_name": "Ashish Vaswani"}},
                {"author": {"display_name": "Noam Shazeer"}},
                {"author": {"display_name": "Niki Parmar"}},
                {"author": {"display_name": "Jakob Uszkoreit"}}
            ],
            "open_access": {"is_oa": false, "oa_url": null},
            "locations": [
                {"is_oa": false, "landing_page_url": "https://papers.nips.cc/x", "source": {"display_name": "NeurIPS"}},
                {"is_oa": true, "landing_page_url": "https://arxiv.org/abs/1706.03762", "pdf_url": "https://arxiv.org/pdf/1706.03762", "source": {"display_name": "arXiv (Cornell University)"}}
            ],
            "abstract_inverted_index": {"dominant": [1], "The": [0], "models": [3], "sequence": [2]},
            "unknown_field": 42
        }))
        .unwrap()
    }

    #[test]
    fn test_basic_accessors() {
        let work = sample();
        assert_eq!(work.short_id(), "W2741809807");
        assert_eq!(work.first_author_surname().as_deref(), Some("Vaswani"));
        assert_eq!(work.authors_line(3), "Ashish Vaswani, Noam Shazeer, Niki Parmar et al.");
        assert_eq!(work.abstract_text().as_deref(), Some("The dominant sequence models"));
        assert_eq!(work.bare_doi(), Some("10.5555/3295222.3295349"));
    }

    #[test]
    fn test_pdf_filename() {
        let work = sample();
        assert_eq!(
            work.pdf_filename(),
            "Vaswani_2017_Attention_Is_All_You_Need_Transformers.pdf"
        );

        let anonymous = Work {
            display_name: Some("?!".into()),
            ..Default::default()
        };
        assert_eq!(anonymous.pdf_filename(), "unknown_unknown_unknown.pdf");
    }

    #[test]
    fn test_safe_title_truncates() {
        let long = "a".repeat(80);
        assert_eq!(safe_title(&long).len(), 50);
        assert_eq!(safe_title("  Deep  learning: a survey "), "Deep__learning_a_survey");
    }

    #[test]
    fn test_pdf_url_prefers_oa_url_then_arxiv() {
        let mut work = sample();
        assert_eq!(work.pdf_url().as_deref(), Some("https://arxiv.org/pdf/1706.03762"));

        work.open_access = Some(OpenAccess {
            is_oa: true,
            oa_url: Some("https://example.org/paper.pdf".into()),
        });
        assert_eq!(work.pdf_url().as_deref(), Some("https://example.org/paper.pdf"));
    }

    #[test]
    fn test_pdf_url_falls_back_to_any_open_location() {
        let work: Work = serde_json::from_value(json!({
            "id": "W1",
            "locations": [
                {"is_oa": false, "pdf_url": "https://closed.example/p.pdf"},
                {"is_oa": true, "landing_page_url": "https://repo.example/item/9"}
            ]
        }))
        .unwrap();
        assert_eq!(work.pdf_url().as_deref(), Some("https://repo.example/item/9"));

        let closed = Work::default();
        assert!(closed.pdf_url().is_none());
    }

    #[test]
    fn test_is_acm() {
        assert!(!sample().is_acm());

        let by_doi = Work {
            doi: Some("https://doi.org/10.1145/3292500.3330701".into()),
            ..Default::default()
        };
        assert!(by_doi.is_acm());

        let by_source: Work = serde_json::from_value(json!({
            "id": "W2",
            "primary_location": {"source": {
                "display_name": "Communications of the ACM",
                "host_organization_name": null
            }}
        }))
        .unwrap();
        assert!(by_source.is_acm());

        let by_publisher: Work = serde_json::from_value(json!({
            "id": "W3",
            "locations": [{"source": {"host_organization_name": "Association for Computing Machinery"}}]
        }))
        .unwrap();
        assert!(by_publisher.is_acm());

        let lookalike: Work = serde_json::from_value(json!({
            "id": "W4",
            "locations": [{"source": {"display_name": "Journal of Placement Studies"}}]
        }))
        .unwrap();
        assert!(!lookalike.is_acm());
    }
}
