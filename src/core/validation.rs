//! Input checks shared by the admin services

use crate::core::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("slug pattern is valid")
});

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("color pattern is valid")
});

static DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*\.)?[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)*(:[0-9]{1,5})?$")
        .expect("domain pattern is valid")
});

static LANGUAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2,3}(-[A-Za-z]{2,4})?$").expect("language pattern is valid")
});

/// Trims `value` and rejects it when empty or longer than `max` characters.
pub fn required_text(field: &str, value: &str, max: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::bad_request(format!("{field} must not be empty")));
    }
    if value.chars().count() > max {
        return Err(Error::bad_request(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(value.to_owned())
}

/// Like [`required_text`] but an empty value clears the field.
pub fn optional_text(field: &str, value: &str, max: usize) -> Result<Option<String>> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        required_text(field, value, max).map(Some)
    }
}

pub fn slug(field: &str, value: &str) -> Result<String> {
    let value = required_text(field, value, 100)?;
    if SLUG.is_match(&value) {
        Ok(value)
    } else {
        Err(Error::bad_request(format!(
            "{field} may only contain lowercase letters, digits and single dashes"
        )))
    }
}

/// Turns a title into a slug, e.g. "Free Shipping & Returns" into "free-shipping-returns".
pub fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Accepts absolute http(s) URLs and returns them without a trailing slash.
pub fn http_url(field: &str, value: &str) -> Result<String> {
    let value = required_text(field, value, 2048)?;
    match Url::parse(&value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
            Ok(value.trim_end_matches('/').to_owned())
        }
        _ => Err(Error::bad_request(format!(
            "{field} must be an absolute http(s) URL"
        ))),
    }
}

pub fn optional_http_url(field: &str, value: &str) -> Result<Option<String>> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        http_url(field, value).map(Some)
    }
}

pub fn hex_color(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if HEX_COLOR.is_match(value) {
        Ok(value.to_owned())
    } else {
        Err(Error::bad_request(format!(
            "{field} must be a hex color like #667eea"
        )))
    }
}

pub fn domain(value: &str) -> Result<String> {
    let value = value.trim().to_lowercase();
    if DOMAIN.is_match(&value) {
        Ok(value)
    } else {
        Err(Error::bad_request(format!("{value:?} is not a valid domain")))
    }
}

pub fn language(value: &str) -> Result<String> {
    let value = value.trim();
    if LANGUAGE.is_match(value) {
        Ok(value.to_owned())
    } else {
        Err(Error::bad_request("language must be a language code like en or pt-BR"))
    }
}

pub fn in_range<T>(field: &str, value: T, min: T, max: T) -> Result<T>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value >= min && value <= max {
        Ok(value)
    } else {
        Err(Error::bad_request(format!(
            "{field} must be between {min} and {max}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_rules() {
        assert!(slug("slug", "acme").is_ok());
        assert!(slug("slug", "acme-store-2").is_ok());
        assert!(slug("slug", "Acme").is_err());
        assert!(slug("slug", "acme--store").is_err());
        assert!(slug("slug", "-acme").is_err());
        assert!(slug("slug", "acme store").is_err());
        assert!(slug("slug", "").is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Free Shipping & Returns"), "free-shipping-returns");
        assert_eq!(slugify("  FAQ  "), "faq");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_http_url() {
        assert_eq!(
            http_url("storeUrl", "https://acme.myshopify.com/").unwrap(),
            "https://acme.myshopify.com"
        );
        assert!(http_url("storeUrl", "ftp://acme.test").is_err());
        assert!(http_url("storeUrl", "acme.test").is_err());
        assert_eq!(optional_http_url("logoUrl", " ").unwrap(), None);
    }

    #[test]
    fn test_colors_and_domains() {
        assert!(hex_color("c", "#fff").is_ok());
        assert!(hex_color("c", "#667eea").is_ok());
        assert!(hex_color("c", "667eea").is_err());
        assert!(hex_color("c", "#66").is_err());

        assert_eq!(domain(" Shop.Acme.com ").unwrap(), "shop.acme.com");
        assert!(domain("*.acme.com").is_ok());
        assert!(domain("localhost:3000").is_ok());
        assert!(domain("https://acme.com").is_err());
        assert!(domain("acme.com/path").is_err());
    }

    #[test]
    fn test_range_and_text() {
        assert_eq!(in_range("delay", 120, 0, 120).unwrap(), 120);
        assert!(in_range("temperature", 2.5, 0.0, 2.0).is_err());
        assert_eq!(required_text("title", "  Hi  ", 10).unwrap(), "Hi");
        assert!(required_text("title", "toolong", 3).is_err());
        assert_eq!(optional_text("css", "", 10).unwrap(), None);
        assert!(language("pt-BR").is_ok());
        assert!(language("english").is_err());
    }
}
