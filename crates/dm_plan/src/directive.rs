use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

// -----------------------------------------------------------------------------
// ValidationRule

/// A named validation rule with its arguments, e.g. `min:3` or `between:1,10`.
///
/// Rules are opaque here: they are handed to
/// [`FieldHooks::validate`](crate::FieldHooks::validate) untouched.
///
/// # Examples
///
/// ```
/// use dm_plan::ValidationRule;
///
/// let rule = ValidationRule::parse("between: 1, 10");
/// assert_eq!(rule.name(), "between");
/// assert_eq!(rule.args(), ["1".into(), "10".into()] as [Box<str>; 2]);
/// assert_eq!(rule.to_string(), "between:1,10");
///
/// assert!(ValidationRule::parse("required").args().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidationRule {
    name: Box<str>,
    args: Box<[Box<str>]>,
}

impl ValidationRule {
    pub fn new<I, A>(name: impl Into<Box<str>>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Box<str>>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses `name[:arg[,arg]*]`, trimming whitespace around each part.
    pub fn parse(text: &str) -> Self {
        match text.split_once(':') {
            None => Self::new(text.trim(), Vec::<&str>::new()),
            Some((name, args)) => Self::new(
                name.trim(),
                args.split(',').map(str::trim).filter(|arg| !arg.is_empty()),
            ),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn args(&self) -> &[Box<str>] {
        &self.args
    }
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            f.write_str(if i == 0 { ":" } else { "," })?;
            f.write_str(arg)?;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Directive

/// One instruction attached to a field.
///
/// Written as `#[plan(...)]` on a derived field; see the crate docs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Directive {
    /// Convert the read value with the named caster.
    CastWith(Box<str>),
    /// Read the field from this source path instead of its name.
    MapFrom(Box<str>),
    /// Export the field under this target path instead of its name.
    MapTo(Box<str>),
    /// Leave the field out of exports.
    Hidden,
    /// Never read the field from the source.
    Computed,
    ValidationRule(ValidationRule),
}

impl Directive {
    /// The attribute key this directive is written with.
    pub const fn key(&self) -> &'static str {
        match self {
            Self::CastWith(_) => "cast_with",
            Self::MapFrom(_) => "map_from",
            Self::MapTo(_) => "map_to",
            Self::Hidden => "hidden",
            Self::Computed => "computed",
            Self::ValidationRule(_) => "rule",
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CastWith(arg) | Self::MapFrom(arg) | Self::MapTo(arg) => {
                write!(f, "{} = \"{arg}\"", self.key())
            }
            Self::Hidden | Self::Computed => f.write_str(self.key()),
            Self::ValidationRule(rule) => write!(f, "rule = \"{rule}\""),
        }
    }
}
