//! Stage 4 — Citation extraction: DOI, ISBN, URL, parenthetical year, and
//! numeric reference scans (spec §4.8).
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DOI_RE: Regex = Regex::new(r"10\.\d{4,9}/[-._;()/:A-Za-z0-9]+").unwrap();
    static ref ISBN_RE: Regex =
        Regex::new(r"(?:ISBN[-\s]?(?:13|10)?:?\s*)((?:97[89][- ]?)?\d[\d- ]{8,15}\d)").unwrap();
    static ref URL_RE: Regex = Regex::new(r"https?://[^\s)>\]]+").unwrap();
    static ref YEAR_RE: Regex = Regex::new(r"\((19|20)\d{2}\)").unwrap();
    static ref NUMERIC_REF_RE: Regex = Regex::new(r"\[\d+\]").unwrap();
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Citations {
    pub dois: Vec<String>,
    pub isbns: Vec<String>,
    pub urls: Vec<String>,
    pub years: Vec<String>,
    pub numeric_refs: Vec<String>,
}

impl Citations {
    pub fn total(&self) -> usize {
        self.dois.len() + self.isbns.len() + self.urls.len() + self.years.len() + self.numeric_refs.len()
    }
}

pub fn extract(text: &str) -> Citations {
    Citations {
        dois: DOI_RE.find_iter(text).map(|m| m.as_str().to_string()).collect(),
        isbns: ISBN_RE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .collect(),
        urls: URL_RE.find_iter(text).map(|m| m.as_str().to_string()).collect(),
        years: YEAR_RE.find_iter(text).map(|m| m.as_str().to_string()).collect(),
        numeric_refs: NUMERIC_REF_RE.find_iter(text).map(|m| m.as_str().to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_doi() {
        let c = extract("See doi:10.1038/nphys1170 for details.");
        assert_eq!(c.dois, vec!["10.1038/nphys1170"]);
    }

    #[test]
    fn finds_url() {
        let c = extract("available at https://example.com/paper.pdf (retrieved 2024)");
        assert_eq!(c.urls, vec!["https://example.com/paper.pdf"]);
    }

    #[test]
    fn finds_parenthetical_year_and_numeric_ref() {
        let c = extract("as shown previously (2019) and again [3].");
        assert_eq!(c.years, vec!["(2019)"]);
        assert_eq!(c.numeric_refs, vec!["[3]"]);
    }

    #[test]
    fn finds_isbn() {
        let c = extract("ISBN-13: 978-3-16-148410-0");
        assert_eq!(c.isbns.len(), 1);
    }

    #[test]
    fn no_matches_on_plain_text() {
        let c = extract("nothing citation-like here at all");
        assert_eq!(c.total(), 0);
    }
}
