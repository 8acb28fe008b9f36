use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::writer::MessageWriter;

/// A value that can be written into a message.
///
/// Scalar values (`is_scalar() == true`) write their token directly under the
/// given name. Structured values are wrapped by the writer in a named
/// begin/end pair and write one token per member.
///
/// ```
/// use nanolog::{LogValue, MessageWriter};
///
/// struct Point { x: i32, y: i32 }
///
/// impl LogValue for Point {
///     fn write_members(
///         &self,
///         writer: &mut MessageWriter<'_>,
///         _name: &str,
///         _format: Option<&str>,
///     ) {
///         writer.append_int("X", Some(self.x), None);
///         writer.append_int("Y", Some(self.y), None);
///     }
/// }
/// ```
pub trait LogValue {
    fn is_scalar(&self) -> bool {
        false
    }

    fn write_members(&self, writer: &mut MessageWriter<'_>, name: &str, format: Option<&str>);
}

/// Fixed-point decimal: `mantissa * 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: i128,
    scale: u8,
}

impl Decimal {
    /// Largest supported scale.
    pub const MAX_SCALE: u8 = 28;

    /// Scales beyond [`Decimal::MAX_SCALE`] are clamped.
    pub fn new(mantissa: i128, scale: u8) -> Self {
        Self {
            mantissa,
            scale: scale.min(Self::MAX_SCALE),
        }
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Lossy conversion for display and comparisons.
    pub fn to_f64(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.unsigned_abs().to_string();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let scale = self.scale as usize;
        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

macro_rules! scalar_value {
    ($ty:ty, $append:ident) => {
        impl LogValue for $ty {
            fn is_scalar(&self) -> bool {
                true
            }

            fn write_members(
                &self,
                writer: &mut MessageWriter<'_>,
                name: &str,
                format: Option<&str>,
            ) {
                writer.$append(name, Some(*self), format);
            }
        }
    };
    ($ty:ty, $append:ident, as $wide:ty) => {
        impl LogValue for $ty {
            fn is_scalar(&self) -> bool {
                true
            }

            fn write_members(
                &self,
                writer: &mut MessageWriter<'_>,
                name: &str,
                format: Option<&str>,
            ) {
                writer.$append(name, Some(*self as $wide), format);
            }
        }
    };
}

scalar_value!(u8, append_byte);
scalar_value!(i8, append_short, as i16);
scalar_value!(i16, append_short);
scalar_value!(u16, append_ushort);
scalar_value!(i32, append_int);
scalar_value!(u32, append_uint);
scalar_value!(i64, append_long);
scalar_value!(u64, append_ulong);
scalar_value!(isize, append_long, as i64);
scalar_value!(usize, append_ulong, as u64);
scalar_value!(f32, append_float);
scalar_value!(f64, append_double);
scalar_value!(Decimal, append_decimal);

impl LogValue for bool {
    fn is_scalar(&self) -> bool {
        true
    }

    fn write_members(&self, writer: &mut MessageWriter<'_>, name: &str, _format: Option<&str>) {
        writer.append_bool(name, Some(*self));
    }
}

impl LogValue for char {
    fn is_scalar(&self) -> bool {
        true
    }

    fn write_members(&self, writer: &mut MessageWriter<'_>, name: &str, _format: Option<&str>) {
        writer.append_char(name, Some(*self));
    }
}

impl LogValue for str {
    fn is_scalar(&self) -> bool {
        true
    }

    fn write_members(&self, writer: &mut MessageWriter<'_>, name: &str, format: Option<&str>) {
        writer.append_string(name, Some(self), format);
    }
}

impl LogValue for String {
    fn is_scalar(&self) -> bool {
        true
    }

    fn write_members(&self, writer: &mut MessageWriter<'_>, name: &str, format: Option<&str>) {
        writer.append_string(name, Some(self.as_str()), format);
    }
}

impl LogValue for Uuid {
    fn is_scalar(&self) -> bool {
        true
    }

    fn write_members(&self, writer: &mut MessageWriter<'_>, name: &str, _format: Option<&str>) {
        writer.append_guid(name, Some(*self));
    }
}

impl<Tz: TimeZone> LogValue for DateTime<Tz> {
    fn is_scalar(&self) -> bool {
        true
    }

    fn write_members(&self, writer: &mut MessageWriter<'_>, name: &str, format: Option<&str>) {
        writer.append_date_time(name, Some(self.with_timezone(&Utc)), format);
    }
}

impl<T: LogValue> LogValue for Option<T> {
    fn is_scalar(&self) -> bool {
        self.as_ref().map_or(true, T::is_scalar)
    }

    fn write_members(&self, writer: &mut MessageWriter<'_>, name: &str, format: Option<&str>) {
        match self {
            Some(value) => value.write_members(writer, name, format),
            None => writer.append_null(name),
        }
    }
}

impl<T: LogValue + ?Sized> LogValue for &T {
    fn is_scalar(&self) -> bool {
        (**self).is_scalar()
    }

    fn write_members(&self, writer: &mut MessageWriter<'_>, name: &str, format: Option<&str>) {
        (**self).write_members(writer, name, format)
    }
}
