use morel::{Finder, Syntax};

/// Markers that identify expressions, raw expressions and blocks
/// within text.
pub enum Marker {
    /// Beginning of an escaped expression - `{{`.
    BeginExpression = 0,
    /// End of an escaped expression - `}}`.
    EndExpression = 1,
    /// Beginning of a raw expression - `{!`.
    BeginRaw = 2,
    /// End of a raw expression - `!}`.
    EndRaw = 3,
    /// Beginning of a block - `{%`.
    BeginBlock = 4,
    /// End of a block - `%}`.
    EndBlock = 5,
}

impl From<usize> for Marker {
    fn from(value: usize) -> Self {
        match value {
            0 => Self::BeginExpression,
            1 => Self::EndExpression,
            2 => Self::BeginRaw,
            3 => Self::EndRaw,
            4 => Self::BeginBlock,
            5 => Self::EndBlock,
            _ => unreachable!(),
        }
    }
}

impl From<Marker> for usize {
    fn from(marker: Marker) -> Self {
        marker as usize
    }
}

/// Return a new [`Finder`] compiled from the delimiters.
pub fn finder<T: AsRef<[u8]>>() -> Finder<T> {
    let markers = vec![
        (Marker::BeginExpression.into(), "{{".into()),
        (Marker::EndExpression.into(), "}}".into()),
        (Marker::BeginRaw.into(), "{!".into()),
        (Marker::EndRaw.into(), "!}".into()),
        (Marker::BeginBlock.into(), "{%".into()),
        (Marker::EndBlock.into(), "%}".into()),
    ];

    Finder::new(Syntax::new(markers))
}

/// The delimiter that closes a block, used when scanning for the end
/// of a `verbatim` block.
pub const END_BLOCK: &str = "%}";
