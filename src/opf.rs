use lazy_static::lazy_static;
use regex::Regex;

use crate::entry::Metadata;

lazy_static! {
    static ref DC_TITLE: Regex = Regex::new(r"<dc:title[^>]*>([^<]*)</dc:title>").unwrap();
    static ref DC_CREATOR: Regex = Regex::new(r"<dc:creator[^>]*>([^<]*)</dc:creator>").unwrap();
    static ref DC_DESCRIPTION: Regex =
        Regex::new(r"<dc:description[^>]*>([^<]*)</dc:description>").unwrap();
    static ref DC_DATE: Regex = Regex::new(r"<dc:date[^>]*>([^<]*)</dc:date>").unwrap();
    static ref IN_LANGUAGE: Regex =
        Regex::new(r"<DictionaryInLanguage>([^<]*)</DictionaryInLanguage>").unwrap();
    static ref OUT_LANGUAGE: Regex =
        Regex::new(r"<DictionaryOutLanguage>([^<]*)</DictionaryOutLanguage>").unwrap();
}

fn capture(pattern: &Regex, package: &str) -> Option<String> {
    pattern
        .captures(package)
        .map(|cap| cap[1].trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Pull the optional dictionary metadata out of an OPF package file written
/// by the unpacker. Fields that are absent or empty stay `None`; defaults
/// are substituted later by the output writers, not here.
pub fn parse_opf(package: &str) -> Metadata {
    Metadata {
        title: capture(&DC_TITLE, package),
        description: capture(&DC_DESCRIPTION, package),
        creator: capture(&DC_CREATOR, package),
        date: capture(&DC_DATE, package),
        input_language: capture(&IN_LANGUAGE, package),
        output_language: capture(&OUT_LANGUAGE, package),
    }
}
