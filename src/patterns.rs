//! Filename pattern library
//!
//! An ordered catalogue of regular expressions, each describing one filename
//! convention. Patterns are written in verbose syntax (whitespace is ignored,
//! `#` starts a comment, `\x20` is a literal space) and are anchored at the
//! start of the filename. The first pattern that matches wins.
//!
//! Named groups carry the extracted fields. Every pattern must declare
//! `seriesname` and one way of encoding the episode numbers:
//!
//! - `episodenumber1`, `episodenumber2`, ... for explicit lists
//! - `episodenumberstart` and `episodenumberend` for ranges
//! - `episodenumber` for a single episode
//! - `year`, `month` and `day` for dated episodes
//!
//! `seasonnumber` selects season/episode numbering, `group` marks anime
//! releases. Any other named group (such as `crc`) is kept as an extra field.

use crate::config::ConfigValueError;
use fancy_regex::{Captures, Regex};
use tracing::{debug, warn};

/// Built-in filename patterns, in priority order
pub const DEFAULT_PATTERNS: &[&str] = &[
    // [group] Show - 01-02 [crc]
    r"^\[(?P<group>.+?)\]\x20?               # [group]
    (?P<seriesname>.*?)\x20?[-_]\x20?        # show name and separator
    (?P<episodenumberstart>\d+)              # first episode
    ([-_]\d+)*                               # middle episodes
    [-_](?P<episodenumberend>\d+)            # last episode
    (?:.*\[(?P<crc>.+?)\])?                  # optional [crc]
    [^/]*$",
    // [group] Show - 01 [crc]
    r"^\[(?P<group>.+?)\]\x20?               # [group]
    (?P<seriesname>.*)                       # show name
    \x20?[-_]\x20?                           # separator
    (?P<episodenumber>\d+)                   # episode
    (?:.*\[(?P<crc>.+?)\])?                  # optional [crc]
    [^/]*$",
    // foo s01e23 s01e24 s01e25 *
    r"^((?P<seriesname>.+?)[\x20._-])?       # show name
    [Ss](?P<seasonnumber>[0-9]+)             # s01
    [.\x20-]?                                # separator
    [Ee](?P<episodenumberstart>[0-9]+)       # first e23
    ([.\x20-]+                               # separator
    [Ss](?P=seasonnumber)                    # s01
    [.\x20-]?                                # separator
    [Ee][0-9]+)*                             # e24 etc (middle groups)
    ([.\x20-]+                               # separator
    [Ss](?P=seasonnumber)                    # last s01
    [.\x20-]?                                # separator
    [Ee](?P<episodenumberend>[0-9]+))        # final episode number
    [^/]*$",
    // foo.s01e23e24*
    r"^((?P<seriesname>.+?)[\x20._-])?       # show name
    [Ss](?P<seasonnumber>[0-9]+)             # s01
    [.\x20-]?                                # separator
    [Ee](?P<episodenumberstart>[0-9]+)       # first e23
    ([.\x20-]?[Ee][0-9]+)*                   # e24e25 etc
    [.\x20-]?[Ee](?P<episodenumberend>[0-9]+) # final episode number
    [^/]*$",
    // foo.1x23 1x24 1x25
    r"^((?P<seriesname>.+?)[\x20._-])?       # show name
    (?P<seasonnumber>[0-9]+)                 # first season number (1)
    [xX](?P<episodenumberstart>[0-9]+)       # first episode (x23)
    ([\x20._-]+                              # separator
    (?P=seasonnumber)                        # more season numbers (1)
    [xX][0-9]+)*                             # more episode numbers (x24)
    ([\x20._-]+                              # separator
    (?P=seasonnumber)                        # last season number (1)
    [xX](?P<episodenumberend>[0-9]+))        # last episode number (x25)
    [^/]*$",
    // foo.1x23x24*
    r"^((?P<seriesname>.+?)[\x20._-])?       # show name
    (?P<seasonnumber>[0-9]+)                 # 1
    [xX](?P<episodenumberstart>[0-9]+)       # first x23
    ([xX][0-9]+)*                            # x24x25 etc
    [xX](?P<episodenumberend>[0-9]+)         # final episode number
    [^/]*$",
    // foo.s01e23-24*
    r"^((?P<seriesname>.+?)[\x20._-])?       # show name
    [Ss](?P<seasonnumber>[0-9]+)             # s01
    [.\x20-]?                                # separator
    [Ee](?P<episodenumberstart>[0-9]+)       # first e23
    (-[Ee]?[0-9]+)*                          # -24 etc
    -[Ee]?(?P<episodenumberend>[0-9]+)       # final episode number
    [.\x20-]                                 # separator, so s01e01-720p is not 720 episodes
    [^/]*$",
    // foo.1x23-24*
    r"^((?P<seriesname>.+?)[\x20._-])?       # show name
    (?P<seasonnumber>[0-9]+)                 # 1
    [xX](?P<episodenumberstart>[0-9]+)       # first x23
    ([-+][0-9]+)*                            # -24 etc
    [-+](?P<episodenumberend>[0-9]+)         # final episode number
    ([.+\x20-].*                             # separator, so 1x01-720p is not 720 episodes
    |$)",
    // foo.[1x09-11]*
    r"^(?P<seriesname>.+?)[\x20._-]          # show name and padding
    \[?                                      # [
    (?P<seasonnumber>[0-9]+)                 # 1
    [xX]                                     # x
    (?P<episodenumberstart>[0-9]+)           # 09
    ([-+][0-9]+)*                            # middle episodes
    [-+]                                     # -
    (?P<episodenumberend>[0-9]+)             # 11
    \]                                       # ]
    [^/]*$",
    // foo - [012]
    r"^((?P<seriesname>.+?)[\x20._-])?       # show name and padding
    \[                                       # [ not optional (too ambiguous)
    (?P<episodenumber>[0-9]+)                # episode
    \]                                       # ]
    [^/]*$",
    // foo.s0101, foo.0201
    r"^(?P<seriesname>.+?)[\x20._-]          # show name and padding
    [Ss](?P<seasonnumber>[0-9]{2})           # s01
    [.\x20-]?                                # separator
    (?P<episodenumber>[0-9]{2})              # 01
    [^0-9]*$",
    // foo.1x09*
    r"^((?P<seriesname>.+?)[\x20._-])?       # show name and padding
    \[?                                      # [ optional
    (?P<seasonnumber>[0-9]+)                 # season
    [xX]                                     # x
    (?P<episodenumber>[0-9]+)                # episode
    \]?                                      # ] optional
    [^/]*$",
    // foo.s01.e01, foo.s01_e01, "foo.s01 - e01"
    r"^((?P<seriesname>.+?)[\x20._-])?       # show name and padding
    \[?                                      # [ optional
    [Ss](?P<seasonnumber>[0-9]+)             # s01
    \x20?[._\x20-]?\x20?                     # separator
    [Ee]?(?P<episodenumber>[0-9]+)           # e01
    \]?                                      # ] optional
    [^/]*$",
    // foo.2010.01.02.etc
    r"^((?P<seriesname>.+?)[\x20._-])?       # show name
    (?P<year>\d{4})                          # year
    [\x20._-]                                # separator
    (?P<month>\d{2})                         # month
    [\x20._-]                                # separator
    (?P<day>\d{2})                           # day
    [^/]*$",
    // foo - [01.09]
    r"^((?P<seriesname>.+?))                 # show name
    [\x20._-]?                               # padding
    \[                                       # [
    (?P<seasonnumber>[0-9]+?)                # season
    [.]                                      # .
    (?P<episodenumber>[0-9]+?)               # episode
    \]                                       # ]
    [\x20._-]?                               # padding
    [^/]*$",
    // Foo - S2 E 02 - etc
    r"^(?P<seriesname>.+?)\x20?[\x20._-]\x20? # show name and padding
    [Ss](?P<seasonnumber>[0-9]+)[.\x20-]?    # S2
    [Ee]?\x20?(?P<episodenumber>[0-9]+)      # E 02
    [^/]*$",
    // Show - Episode 9999 [S 12 - Ep 131] - etc
    r"(?P<seriesname>.+)                     # show name
    \x20-\x20                                # -
    [Ee]pisode\x20\d+                        # Episode 1234 (ignored)
    \x20
    \[                                       # [
    [sS]\x20?(?P<seasonnumber>\d+)           # s 12
    (\x20|\x20-\x20|-)                       # space, or -
    ([eE]|[eE]p)\x20?(?P<episodenumber>\d+)  # e or ep 12
    \]                                       # ]
    .*$                                      # rest of file",
    // show name 2 of 6 - blah
    r"^(?P<seriesname>.+?)                   # show name
    [\x20._-]                                # padding
    (?P<episodenumber>[0-9]+)                # 2
    [\x20._-]?of[\x20._-]?                   # of
    \d+                                      # 6
    ([._\x20-]|$|[^/]*$)                     # more padding, then anything",
    // Show.Name.Part.1.and.Part.2
    r"(?i)
    ^(?P<seriesname>.+?)                     # show name
    [\x20._-]                                # padding
    (?:part|pt)?[._\x20-]
    (?P<episodenumberstart>[0-9]+)           # part 1
    (?:
      [\x20._-](?:and|&|to)                  # and
      [\x20._-](?:part|pt)?                  # part 2
      [\x20._-](?:[0-9]+))*                  # middle group, optional, repeating
    [\x20._-](?:and|&|to)                    # and
    [\x20._-]?(?:part|pt)?                   # part 3
    [\x20._-](?P<episodenumberend>[0-9]+)    # last episode number
    [._\x20-][^/]*$                          # more padding, then anything",
    // Show.Name.Part1
    r"^(?P<seriesname>.+?)                   # show name
    [\x20._-]                                # padding
    [Pp]art\x20?(?P<episodenumber>[0-9]+)    # part 1
    [._\x20-][^/]*$                          # more padding, then anything",
    // show name Season 01 Episode 20
    r"^(?P<seriesname>.+?)\x20?              # show name
    [Ss]eason\x20?(?P<seasonnumber>[0-9]+)\x20? # season 1
    [Ee]pisode\x20?(?P<episodenumber>[0-9]+) # episode 20
    [^/]*$",
    // foo.103*
    r"^(?P<seriesname>.+)[\x20._-]           # show name and padding
    (?P<seasonnumber>[0-9]{1})               # 1
    (?P<episodenumber>[0-9]{2})              # 03
    [._\x20-][^/]*$",
    // foo.0103*
    r"^(?P<seriesname>.+)[\x20._-]           # show name and padding
    (?P<seasonnumber>[0-9]{2})               # 01
    (?P<episodenumber>[0-9]{2,3})            # 03
    [._\x20-][^/]*$",
    // show.name.e123.abc
    r"^(?P<seriesname>.+?)                   # show name
    [\x20._-]                                # padding
    [Ee](?P<episodenumber>[0-9]+)            # e123
    [._\x20-][^/]*$                          # more padding, then anything",
];

/// How a pattern encodes the episode numbers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpisodeNumbering {
    /// `episodenumber1`, `episodenumber2`, ..., listed in declaration order
    Numbered(Vec<String>),
    /// `episodenumberstart` and `episodenumberend`
    Range,
    /// `episodenumber`
    Single,
    /// `year`, `month` and `day`
    Date,
}

/// Which kind of episode a pattern produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeShape {
    Seasoned,
    Dated,
    Anime,
    NoSeason,
}

/// A compiled filename pattern together with its field classification
#[derive(Debug)]
pub struct EpisodePattern {
    source: String,
    regex: Regex,
    numbering: EpisodeNumbering,
    shape: EpisodeShape,
    fields: Vec<String>,
}

impl EpisodePattern {
    /// Compiles one pattern
    ///
    /// Returns `Ok(None)` when the regular expression itself is invalid, such
    /// patterns are skipped. A valid expression with an unusable set of named
    /// groups is a configuration error.
    fn compile(source: &str) -> Result<Option<Self>, ConfigValueError> {
        // Verbose mode, anchored like a match at the start of the name. The
        // newline ends a trailing comment before the closing parenthesis.
        let anchored = format!("(?x)^(?:{source}\n)");

        let regex = match Regex::new(&anchored) {
            Ok(regex) => regex,
            Err(e) => {
                warn!(error = %e, pattern = source, "Invalid filename pattern, skipping");
                return Ok(None);
            }
        };

        let fields: Vec<String> = regex
            .capture_names()
            .flatten()
            .map(str::to_string)
            .collect();

        let (numbering, shape) =
            classify(&fields).map_err(|reason| ConfigValueError::MalformedPattern {
                pattern: source.to_string(),
                reason,
            })?;

        Ok(Some(Self {
            source: source.to_string(),
            regex,
            numbering,
            shape,
            fields,
        }))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn numbering(&self) -> &EpisodeNumbering {
        &self.numbering
    }

    pub fn shape(&self) -> EpisodeShape {
        self.shape
    }

    /// Names of all named groups declared by the pattern
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Matches the pattern against a filename
    ///
    /// Matching that exceeds the backtracking limit counts as no match.
    pub fn captures<'t>(&self, name: &'t str) -> Option<Captures<'t>> {
        match self.regex.captures(name) {
            Ok(captures) => captures,
            Err(e) => {
                warn!(error = %e, name, "Filename pattern failed to run, treating as no match");
                None
            }
        }
    }
}

/// Decides numbering and episode shape from the declared group names
fn classify(fields: &[String]) -> Result<(EpisodeNumbering, EpisodeShape), String> {
    let has = |name: &str| fields.iter().any(|f| f == name);

    if !has("seriesname") {
        return Err("no seriesname group".to_string());
    }

    let date_fields = ["year", "month", "day"].iter().filter(|f| has(f)).count();

    let numbering = if has("episodenumber1") {
        EpisodeNumbering::Numbered(
            fields
                .iter()
                .filter(|f| is_numbered_episode_field(f))
                .cloned()
                .collect(),
        )
    } else if has("episodenumberstart") || has("episodenumberend") {
        if !(has("episodenumberstart") && has("episodenumberend")) {
            return Err("episodenumberstart and episodenumberend must be used together".to_string());
        }
        EpisodeNumbering::Range
    } else if has("episodenumber") {
        EpisodeNumbering::Single
    } else if date_fields > 0 {
        if date_fields != 3 {
            return Err("year, month and day must be used together".to_string());
        }
        EpisodeNumbering::Date
    } else {
        return Err("no episode number or date groups".to_string());
    };

    let shape = if has("seasonnumber") {
        if numbering == EpisodeNumbering::Date {
            return Err("seasonnumber cannot be combined with a date".to_string());
        }
        EpisodeShape::Seasoned
    } else if numbering == EpisodeNumbering::Date {
        EpisodeShape::Dated
    } else if has("group") {
        EpisodeShape::Anime
    } else {
        EpisodeShape::NoSeason
    };

    Ok((numbering, shape))
}

/// `episodenumber` followed by digits only
pub(crate) fn is_numbered_episode_field(name: &str) -> bool {
    name.strip_prefix("episodenumber")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Ordered collection of compiled filename patterns
#[derive(Debug)]
pub struct PatternLibrary {
    patterns: Vec<EpisodePattern>,
}

impl PatternLibrary {
    /// Compiles all patterns, invalid expressions are logged and skipped
    pub fn new<S: AsRef<str>>(sources: &[S]) -> Result<Self, ConfigValueError> {
        let mut patterns = Vec::with_capacity(sources.len());

        for source in sources {
            if let Some(pattern) = EpisodePattern::compile(source.as_ref())? {
                patterns.push(pattern);
            }
        }

        debug!(
            compiled = patterns.len(),
            configured = sources.len(),
            "Compiled filename patterns"
        );

        Ok(Self { patterns })
    }

    /// The built-in catalogue
    pub fn with_defaults() -> Result<Self, ConfigValueError> {
        Self::new(DEFAULT_PATTERNS)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EpisodePattern> {
        self.patterns.iter()
    }

    /// Returns the first pattern matching `name` with its captures
    pub fn first_match<'t>(&self, name: &'t str) -> Option<(&EpisodePattern, Captures<'t>)> {
        self.patterns
            .iter()
            .find_map(|pattern| pattern.captures(name).map(|captures| (pattern, captures)))
    }
}
