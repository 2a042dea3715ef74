use std::fmt;

use deku::prelude::*;
use jiff::{civil::DateTime, Zoned};

/// Minute-resolution timestamp as stored on the tag (6 bytes).
///
/// Kept as raw fields: tags in the wild carry zeroed or otherwise invalid dates, which must
/// survive a read/write cycle untouched.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, DekuRead, DekuWrite)]
#[deku(endian = "endian", ctx = "endian: deku::ctx::Endian")]
pub struct TagTime {
	pub minute: u8,
	pub hour: u8,
	pub day: u8,
	pub month: u8,
	pub year: u16,
}

impl TagTime {
	/// Current local wall-clock time.
	pub fn now() -> Self {
		Self::from_datetime(Zoned::now().datetime())
	}

	pub fn from_datetime(dt: DateTime) -> Self {
		Self {
			minute: dt.minute().try_into().unwrap_or_default(),
			hour: dt.hour().try_into().unwrap_or_default(),
			day: dt.day().try_into().unwrap_or_default(),
			month: dt.month().try_into().unwrap_or_default(),
			year: dt.year().try_into().unwrap_or_default(),
		}
	}

	/// As a civil datetime, if the stored fields form a valid date.
	pub fn to_datetime(self) -> Option<DateTime> {
		DateTime::new(
			self.year.try_into().ok()?,
			self.month.try_into().ok()?,
			self.day.try_into().ok()?,
			self.hour.try_into().ok()?,
			self.minute.try_into().ok()?,
			0,
			0,
		)
		.ok()
	}

	/// Whether the tag never recorded this time.
	pub fn is_unset(self) -> bool {
		self == Self::default()
	}
}

impl fmt::Display for TagTime {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}:{:02} {}/{} {}",
			self.hour, self.minute, self.month, self.day, self.year
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display() {
		let time = TagTime {
			minute: 7,
			hour: 13,
			day: 24,
			month: 12,
			year: 2011,
		};
		assert_eq!(time.to_string(), "13:07 12/24 2011");
	}

	#[test]
	fn civil_conversion() {
		let dt = DateTime::new(2011, 10, 16, 9, 30, 0, 0).unwrap();
		let time = TagTime::from_datetime(dt);
		assert_eq!(time.to_datetime(), Some(dt));
		assert_eq!(TagTime::default().to_datetime(), None);
		assert!(TagTime::default().is_unset());
	}
}
