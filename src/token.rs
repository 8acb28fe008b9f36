/// Tag byte that starts every token in a message stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TokenType {
    None = 0,
    Literal1,
    Literal2,
    Literal4,
    Null,
    BoolTrue,
    BoolFalse,
    Byte,
    Char,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
    Decimal,
    DateTime,
    Guid,
    String1,
    String2,
    String4,
    LogValue,
    LogValueEndMembers,
    End = 0xFF,
}

impl TokenType {
    /// Decodes a tag byte. Unknown tags return `None` so the decoder can stop.
    pub fn from_u8(tag: u8) -> Option<Self> {
        use TokenType::*;
        let token = match tag {
            0 => None,
            1 => Literal1,
            2 => Literal2,
            3 => Literal4,
            4 => Null,
            5 => BoolTrue,
            6 => BoolFalse,
            7 => Byte,
            8 => Char,
            9 => Short,
            10 => UShort,
            11 => Int,
            12 => UInt,
            13 => Long,
            14 => ULong,
            15 => Float,
            16 => Double,
            17 => Decimal,
            18 => DateTime,
            19 => Guid,
            20 => String1,
            21 => String2,
            22 => String4,
            23 => LogValue,
            24 => LogValueEndMembers,
            0xFF => End,
            _ => return Option::None,
        };
        Some(token)
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether the token carries an optional format string after its name.
    pub fn has_format(self) -> bool {
        use TokenType::*;
        matches!(
            self,
            Byte | Short
                | UShort
                | Int
                | UInt
                | Long
                | ULong
                | Float
                | Double
                | Decimal
                | DateTime
                | String1
                | String2
                | String4
        )
    }
}
