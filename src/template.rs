//! printf-style templates with named fields
//!
//! Templates use the `%(name)s` / `%(name)02d` notation. Supported conversions
//! are `s` (text), `d` and `i` (integers), with the `-` and `0` flags, a field
//! width and a precision. `%%` produces a literal percent sign.

use crate::config::ConfigValueError;
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// A value that can be substituted into a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Number(i64),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(i64::from(value))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => f.write_str(text),
            Value::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Field mapping used to render a template
pub type Fields = BTreeMap<String, Value>;

#[derive(Debug, Default)]
struct Directive {
    left_align: bool,
    zero_pad: bool,
    width: usize,
    precision: Option<usize>,
    conversion: char,
}

/// Renders `template`, every referenced field must be present in `fields`
pub fn render(template: &str, fields: &Fields) -> Result<String, ConfigValueError> {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            output.push(c);
            continue;
        }

        match chars.next() {
            Some('%') => output.push('%'),
            Some('(') => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(')') => break,
                        Some(c) => name.push(c),
                        None => return Err(invalid(template, "unterminated field name")),
                    }
                }

                let directive = parse_directive(&mut chars, template)?;
                let value = fields
                    .get(&name)
                    .ok_or_else(|| ConfigValueError::UndefinedField {
                        template: template.to_string(),
                        field: name.clone(),
                    })?;

                output.push_str(&apply_directive(&directive, value, template, &name)?);
            }
            Some(_) => return Err(invalid(template, "positional placeholder in named template")),
            None => return Err(invalid(template, "dangling '%'")),
        }
    }

    Ok(output)
}

/// Formats a single number with a positional template such as `%02d`
pub fn format_number(template: &str, number: i64) -> Result<String, ConfigValueError> {
    let mut output = String::new();
    let mut chars = template.chars().peekable();
    let mut used = false;

    while let Some(c) = chars.next() {
        if c != '%' {
            output.push(c);
            continue;
        }

        if chars.peek() == Some(&'%') {
            chars.next();
            output.push('%');
            continue;
        }

        if used {
            return Err(invalid(template, "more than one placeholder"));
        }

        let directive = parse_directive(&mut chars, template)?;
        output.push_str(&apply_directive(&directive, &Value::Number(number), template, "")?);
        used = true;
    }

    if !used {
        return Err(invalid(template, "no placeholder for the number"));
    }

    Ok(output)
}

fn parse_directive(
    chars: &mut Peekable<Chars<'_>>,
    template: &str,
) -> Result<Directive, ConfigValueError> {
    let mut directive = Directive::default();

    while let Some(&c) = chars.peek() {
        match c {
            '-' => directive.left_align = true,
            '0' => directive.zero_pad = true,
            // Sign and alternate forms have no effect on the supported conversions
            '+' | ' ' | '#' => {}
            _ => break,
        }
        chars.next();
    }

    directive.width = read_digits(chars).unwrap_or(0);

    if chars.peek() == Some(&'.') {
        chars.next();
        directive.precision = Some(read_digits(chars).unwrap_or(0));
    }

    directive.conversion = match chars.next() {
        Some(c @ ('s' | 'd' | 'i')) => c,
        Some(c) => return Err(invalid(template, &format!("unsupported conversion '{c}'"))),
        None => return Err(invalid(template, "missing conversion")),
    };

    Ok(directive)
}

fn read_digits(chars: &mut Peekable<Chars<'_>>) -> Option<usize> {
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits.parse().ok()
}

fn apply_directive(
    directive: &Directive,
    value: &Value,
    template: &str,
    name: &str,
) -> Result<String, ConfigValueError> {
    match directive.conversion {
        's' => {
            let mut text = value.to_string();
            if let Some(precision) = directive.precision {
                text = text.chars().take(precision).collect();
            }
            Ok(pad(text, directive.width, directive.left_align, false))
        }
        _ => {
            let Value::Number(number) = value else {
                return Err(ConfigValueError::NotANumber {
                    template: template.to_string(),
                    field: name.to_string(),
                });
            };

            let mut digits = number.unsigned_abs().to_string();
            if let Some(precision) = directive.precision {
                while digits.len() < precision {
                    digits.insert(0, '0');
                }
            }
            let sign = if *number < 0 { "-" } else { "" };

            if directive.zero_pad && !directive.left_align {
                let width = directive.width.saturating_sub(sign.len());
                Ok(format!("{sign}{}", pad(digits, width, false, true)))
            } else {
                Ok(pad(format!("{sign}{digits}"), directive.width, directive.left_align, false))
            }
        }
    }
}

fn pad(text: String, width: usize, left_align: bool, zeros: bool) -> String {
    let len = text.chars().count();
    if len >= width {
        return text;
    }

    let fill: String = std::iter::repeat_n(if zeros { '0' } else { ' ' }, width - len).collect();
    if left_align {
        text + &fill
    } else {
        fill + &text
    }
}

fn invalid(template: &str, reason: &str) -> ConfigValueError {
    ConfigValueError::InvalidTemplate {
        template: template.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(entries: &[(&str, Value)]) -> Fields {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_render_named_fields() {
        let fields = fields(&[
            ("seriesname", Value::from("Scrubs")),
            ("seasonnumber", Value::Number(1)),
            ("episode", Value::from("01")),
            ("ext", Value::from(".avi")),
        ]);

        assert_eq!(
            render("%(seriesname)s - [%(seasonnumber)02dx%(episode)s]%(ext)s", &fields).unwrap(),
            "Scrubs - [01x01].avi"
        );
    }

    #[test]
    fn test_render_widths_and_literal_percent() {
        let fields = fields(&[("n", Value::Number(7)), ("t", Value::from("abc"))]);

        assert_eq!(render("%(n)3d|%(n)-3d|%(n)03d", &fields).unwrap(), "  7|7  |007");
        assert_eq!(render("[%(t)5s][%(t)-5s][%(t).2s]", &fields).unwrap(), "[  abc][abc  ][ab]");
        assert_eq!(render("100%% %(t)s", &fields).unwrap(), "100% abc");
        assert_eq!(render("%(n)s", &fields).unwrap(), "7");
    }

    #[test]
    fn test_render_missing_field_is_error() {
        let result = render(
            "%(seriesname)s - %(episodename)s",
            &fields(&[("seriesname", Value::from("x"))]),
        );
        assert!(matches!(
            result,
            Err(ConfigValueError::UndefinedField { field, .. }) if field == "episodename"
        ));
    }

    #[test]
    fn test_render_number_conversion_of_text_is_error() {
        let result = render("%(seriesname)02d", &fields(&[("seriesname", Value::from("x"))]));
        assert!(matches!(result, Err(ConfigValueError::NotANumber { .. })));
    }

    #[test]
    fn test_render_malformed_templates() {
        let empty = Fields::new();
        assert!(render("%(seriesname", &empty).is_err());
        assert!(render("100%", &empty).is_err());
        assert!(render("%s", &empty).is_err());
        assert!(render("%(x)f", &fields(&[("x", Value::Number(1))])).is_err());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number("%02d", 3).unwrap(), "03");
        assert_eq!(format_number("%02d", 123).unwrap(), "123");
        assert_eq!(format_number("%d", 5).unwrap(), "5");
        assert_eq!(format_number("E%03d", 5).unwrap(), "E005");
        assert_eq!(format_number("%02d", -3).unwrap(), "-3");
        assert!(format_number("no placeholder", 1).is_err());
        assert!(format_number("%d%d", 1).is_err());
    }
}
