//! String helpers shared by integrations

/// Turn a display name into an identifier fragment
///
/// Lowercases ASCII letters and digits and replaces every other run of
/// characters with a single underscore, trimming underscores at both ends.
/// `"17Track packages In Transit"` becomes `"17track_packages_in_transit"`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_name() {
        assert_eq!(
            slugify("17Track packages In Transit"),
            "17track_packages_in_transit"
        );
        assert_eq!(
            slugify("17Track packages Ready to be Picked Up"),
            "17track_packages_ready_to_be_picked_up"
        );
    }

    #[test]
    fn test_slugify_collapses_and_trims() {
        assert_eq!(slugify("  Seventeen -- Track!  "), "seventeen_track");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify("!!!"), "unknown");
    }
}
