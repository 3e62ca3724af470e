//! Filesystem-safe filenames
//!
//! Turns a synthesized name into something that can be used as a filename on
//! the target platform: forbidden characters are replaced, hidden files and
//! reserved device names are avoided and the length is capped.

use crate::replacements::ExtensionSplitter;
use unicode_normalization::UnicodeNormalization;

/// Longest filename produced, counted in characters
const MAX_FILENAME_LENGTH: usize = 254;

/// Device names that cannot be used as filenames on Windows
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM", "LPT", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6",
    "COM7", "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8",
    "LPT9",
];

/// Platform family whose filename rules apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// macOS, forbids `/` and `:`
    MacOs,
    /// Linux and FreeBSD, forbid only `/`
    Unix,
    /// Everything else, Windows rules
    Windows,
}

impl Platform {
    /// The platform this binary was built for
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(any(target_os = "linux", target_os = "freebsd")) {
            Platform::Unix
        } else {
            Platform::Windows
        }
    }

    /// Characters that may not appear in a filename
    pub fn blacklist(self) -> &'static str {
        match self {
            Platform::MacOs => "/:",
            Platform::Unix => "/",
            Platform::Windows => "\\/:*?\"<>|",
        }
    }

    fn has_reserved_names(self) -> bool {
        self == Platform::Windows
    }
}

/// Decomposes accented characters and drops everything that is not ASCII
pub fn strip_accents(text: &str) -> String {
    text.nfkd().filter(char::is_ascii).collect()
}

/// Makes names valid filenames for one platform
#[derive(Debug, Clone)]
pub struct FilenameSanitizer {
    platform: Platform,
    custom_blacklist: String,
    replace_with: String,
    normalize_unicode: bool,
    extension: ExtensionSplitter,
}

impl FilenameSanitizer {
    pub fn new(platform: Platform, extension: ExtensionSplitter) -> Self {
        Self {
            platform,
            custom_blacklist: String::new(),
            replace_with: "_".to_string(),
            normalize_unicode: false,
            extension,
        }
    }

    /// Additional characters to replace besides the platform blacklist
    pub fn with_custom_blacklist(mut self, characters: &str) -> Self {
        self.custom_blacklist = characters.to_string();
        self
    }

    /// Text substituted for every forbidden character
    pub fn with_replacement(mut self, replacement: &str) -> Self {
        self.replace_with = replacement.to_string();
        self
    }

    /// Strip accents from the base name
    pub fn with_unicode_normalization(mut self, enabled: bool) -> Self {
        self.normalize_unicode = enabled;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Returns a valid filename for `name`
    ///
    /// Invalid characters are replaced, hidden and reserved names are
    /// prefixed with `_` and overlong names are truncated to 254 bytes,
    /// keeping the shorter of base name and extension intact.
    ///
    /// # Arguments
    ///
    /// * `name` - A filename including its extension
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let sanitizer = FilenameSanitizer::new(Platform::Windows, extension);
    /// assert_eq!(sanitizer.make_valid("Test/File.avi"), "Test_File.avi");
    /// assert_eq!(sanitizer.make_valid("COM"), "_COM");
    /// ```
    pub fn make_valid(&self, name: &str) -> String {
        let name = if name.starts_with('.') {
            format!("_{name}")
        } else {
            name.to_string()
        };

        let (base, extension) = self.extension.split(&name);
        let mut extension = extension.to_string();

        let blacklist = self.platform.blacklist();
        let mut base: String = base
            .chars()
            .filter(|&c| c != '\0')
            .fold(String::with_capacity(base.len()), |mut out, c| {
                if blacklist.contains(c) || self.custom_blacklist.contains(c) {
                    out.push_str(&self.replace_with);
                } else {
                    out.push(c);
                }
                out
            });

        base.truncate(base.trim_end().len());

        if self.platform.has_reserved_names() && RESERVED_NAMES.contains(&base.as_str()) {
            base.insert(0, '_');
        }

        if self.normalize_unicode {
            base = strip_accents(&base);
        }

        let base_len = base.chars().count();
        let extension_len = extension.chars().count();
        if base_len + extension_len > MAX_FILENAME_LENGTH {
            if extension_len > base_len {
                let keep = MAX_FILENAME_LENGTH.saturating_sub(base_len);
                extension = extension.chars().take(keep).collect();
            } else {
                let keep = MAX_FILENAME_LENGTH.saturating_sub(extension_len);
                base = base.chars().take(keep).collect();
            }
        }

        base + &extension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitizer(platform: Platform) -> FilenameSanitizer {
        FilenameSanitizer::new(
            platform,
            ExtensionSplitter::new(r"(\.[a-zA-Z0-9]+)$").unwrap(),
        )
    }

    #[test]
    fn test_valid_names_are_untouched() {
        for platform in [Platform::MacOs, Platform::Unix, Platform::Windows] {
            assert_eq!(sanitizer(platform).make_valid("test.avi"), "test.avi");
        }
    }

    #[test]
    fn test_slash_is_replaced_everywhere() {
        for platform in [Platform::MacOs, Platform::Unix, Platform::Windows] {
            assert_eq!(sanitizer(platform).make_valid("Test/File.avi"), "Test_File.avi");
        }
    }

    #[test]
    fn test_platform_blacklists() {
        let name = "a:b*c?.avi";
        assert_eq!(sanitizer(Platform::Unix).make_valid(name), "a:b*c?.avi");
        assert_eq!(sanitizer(Platform::MacOs).make_valid(name), "a_b*c?.avi");
        assert_eq!(sanitizer(Platform::Windows).make_valid(name), "a_b_c_.avi");
        assert_eq!(
            sanitizer(Platform::Windows).make_valid("a\\b\"c<d>e|f.avi"),
            "a_b_c_d_e_f.avi"
        );
    }

    #[test]
    fn test_reserved_names() {
        let windows = sanitizer(Platform::Windows);
        assert_eq!(windows.make_valid("COM"), "_COM");
        assert_eq!(windows.make_valid("CON.avi"), "_CON.avi");
        assert_eq!(windows.make_valid("LPT9"), "_LPT9");
        assert_eq!(windows.make_valid("con"), "con");
        assert_eq!(sanitizer(Platform::Unix).make_valid("COM"), "COM");
    }

    #[test]
    fn test_hidden_files() {
        assert_eq!(sanitizer(Platform::Unix).make_valid(".hidden.avi"), "_.hidden.avi");
        assert_eq!(sanitizer(Platform::Unix).make_valid(".avi"), "_.avi");
    }

    #[test]
    fn test_null_bytes_and_trailing_whitespace() {
        let unix = sanitizer(Platform::Unix);
        assert_eq!(unix.make_valid("te\0st.avi"), "test.avi");
        assert_eq!(unix.make_valid("test   .avi"), "test.avi");
        assert_eq!(unix.make_valid("  test"), "  test");
    }

    #[test]
    fn test_custom_blacklist_and_replacement() {
        let unix = sanitizer(Platform::Unix)
            .with_custom_blacklist("ab")
            .with_replacement("-");
        assert_eq!(unix.make_valid("abc/d.avi"), "--c-d.avi");
    }

    #[test]
    fn test_unicode_normalization() {
        let unix = sanitizer(Platform::Unix).with_unicode_normalization(true);
        assert_eq!(unix.make_valid("Pokémon Löwe.avi"), "Pokemon Lowe.avi");
        assert_eq!(sanitizer(Platform::Unix).make_valid("Pokémon.avi"), "Pokémon.avi");
    }

    #[test]
    fn test_truncate_long_base_name() {
        let name = format!("{}.avi", "a".repeat(300));
        let valid = sanitizer(Platform::Unix).make_valid(&name);
        assert_eq!(valid.chars().count(), MAX_FILENAME_LENGTH);
        assert!(valid.ends_with("a.avi"));
    }

    #[test]
    fn test_truncate_long_extension() {
        let name = format!("a.{}", "b".repeat(300));
        let valid = sanitizer(Platform::Unix).make_valid(&name);
        assert_eq!(valid.chars().count(), MAX_FILENAME_LENGTH);
        assert!(valid.starts_with("a.bbb"));
    }

    #[test]
    fn test_strip_accents() {
        assert_eq!(strip_accents("Déjà vu – naïve"), "Deja vu  naive");
    }
}
