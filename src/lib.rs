use derive_more::{Display, Error};
use itertools::Itertools;

use BzzError::*;


pub type BzzResult<T> = std::result::Result<T, BzzError>;


/// Errors raised while decoding a BZZ stream or archive.  `Waiting` is not a
/// failure: it is the streaming handshake used by [`Algorithm::filter_byte`]
/// to report that no output could be flushed yet.
#[derive(Debug, Display, Clone, Copy, Error)]
pub enum BzzError {
	#[display(fmt = "ReadError({:?})", _0)]
	ReadError(#[error(ignore)] std::io::ErrorKind),
	ReadEof,

	Waiting,

	ArithmeticOverflow,

	#[display(fmt = "WriteError({:?})", _0)]
	WriteError(#[error(ignore)] std::io::ErrorKind),
	WriteEof,

	/// A literal byte, distance field, flag-count field or flag refill byte
	/// ran past the end of the input.
	TruncatedStream,
	/// The archive header region is shorter than its fixed layout requires.
	TruncatedHeader,
	/// A back-reference computed a displacement of zero.
	InvalidDisplacement,
	/// A masked distance field of zero, which has no length-table entry.
	InvalidLengthIndex,
	/// A back-reference would copy from before the start of the output.
	CopyOutOfRange,
}


/// A push-oriented decoding algorithm.
///
/// Input is fed one byte at a time; output is flushed as soon as the
/// algorithm can make progress, and `Err(Waiting)` is returned whenever a
/// byte could be absorbed without producing output.
pub trait Algorithm : Default {
	/// Create a new instance of the algorithm in its initial state (i.e.,
	/// ready to read input data from the beginning).
	fn new() -> Self { <Self as Default>::default() }


	/// Receive one byte of input data, process it, and possibly write one or
	/// more bytes of output data to `output`, returning the number of bytes
	/// written.  `Err(Waiting)` means the byte was consumed but nothing was
	/// flushed.
	fn filter_byte<W: Write>(&mut self, input: u8, output: &mut W) -> BzzResult<usize>;


	/// Signal the end of the input stream, flushing whatever the algorithm
	/// can still produce.  Returns an error if the internal state is
	/// incomplete.
	#[allow(unused_variables)]
	fn finish<W: Write>(&mut self, output: &mut W) -> BzzResult<usize> { Ok(0) }


	fn filter_to_end<R: Read, W: Write>(&mut self, input: &mut R, output: &mut W) -> BzzResult<usize> {
		let mut bytes_written: usize = 0;

		loop {
			match input.read_byte() {
				Ok(b) => {
					match self.filter_byte(b, output) {
						Ok(bytes) => {
							bytes_written = bytes_written.checked_add(bytes)
								.ok_or(ArithmeticOverflow)?;
						},
						Err(Waiting) => (),
						Err(e) => return Err(e),
					};
				},

				Err(ReadEof) => {
					bytes_written = bytes_written.checked_add(self.finish(output)?)
						.ok_or(ArithmeticOverflow)?;
					return Ok(bytes_written);
				},

				Err(e) => return Err(e),
			};
		}
	}


	fn filter_iter<I: IntoIterator<Item=u8>, W: Write>(&mut self, input: I, output: &mut W) -> BzzResult<usize> {
		let mut total: usize = 0;

		for byte in input {
			match self.filter_byte(byte, output) {
				Ok(bytes) => {
					total = total.checked_add(bytes).ok_or(ArithmeticOverflow)?;
				},
				Err(Waiting) => (),
				Err(e) => return Err(e),
			};
		}

		total.checked_add(self.finish(output)?).ok_or(ArithmeticOverflow)
	}


	fn filter_iter_to_vec<I: IntoIterator<Item=u8>>(&mut self, input: I) -> BzzResult<Vec<u8>> {
		let mut output = Vec::new();
		let bytes_written = self.filter_iter(input, &mut output)?;
		output.truncate(bytes_written);
		Ok(output)
	}


	fn filter_slice_to_vec(&mut self, input: &[u8]) -> BzzResult<Vec<u8>> {
		self.filter_iter_to_vec(input.iter().copied())
	}
}


pub trait Read {
	fn read_byte(&mut self) -> BzzResult<u8>;
}


impl<T: std::io::Read> Read for T {
	fn read_byte(&mut self) -> BzzResult<u8> {
		let mut buf = [0u8];
		let result = <Self as std::io::Read>::read(self, &mut buf)
			.map_err(|e| {
				match e.kind() {
					std::io::ErrorKind::UnexpectedEof => ReadEof,
					kind => ReadError(kind),
				}
			})?;

		if result == 1 {
			Ok(buf[0])
		} else {
			Err(ReadEof)
		}
	}
}


pub trait Write {
	fn write_byte(&mut self, byte: u8) -> BzzResult<()>;
}


impl<T: std::io::Write> Write for T {
	fn write_byte(&mut self, byte: u8) -> BzzResult<()> {
		let result = <Self as std::io::Write>::write(self, &[byte])
			.map_err(|e| {
				match e.kind() {
					std::io::ErrorKind::UnexpectedEof => WriteEof,
					kind => WriteError(kind),
				}
			})?;

		if result == 1 {
			Ok(())
		} else {
			Err(WriteEof)
		}
	}
}


/// The per-stream method descriptor byte, decomposed.
///
/// Every one of the 256 possible descriptor bytes decomposes to a valid
/// parameter set; there is no failure mode here.
#[derive(Debug, Clone, Copy)]
pub struct MethodDescriptor {
	/// Extra shift applied to length-table entries above the threshold.
	pub shifter: u8,
	/// Bit width of the length-table index inside a distance field.
	pub len_bits: u8,
	/// Size of the length table, `1 << len_bits` (1..=128).
	pub len_mask: u16,
	/// Last linear table index; clamped to 0x13 when it exceeds 0x07, a
	/// quirk of the format preserved verbatim.
	pub threshold: u16,
}


impl MethodDescriptor {
	pub const THRESHOLD_CAP: u16 = 0x13;


	pub fn from_byte(byte: u8) -> Self {
		let shifter = (byte >> 3) & 0x03;
		let len_bits = (byte & 0x07) ^ 0x07;
		let len_mask = 1u16 << len_bits;

		let mut threshold = len_mask >> 1;
		if threshold > 0x07 {
			threshold = Self::THRESHOLD_CAP;
		};

		Self { shifter, len_bits, len_mask, threshold }
	}


	/// Derive the back-reference length table: `len_mask` entries, linear
	/// (`index + 3`) up to the threshold, stretched by `shifter` above it.
	pub fn length_table(&self) -> Vec<u16> {
		(0..self.len_mask)
			.map(|i| {
				if i <= self.threshold {
					i + 3
				} else {
					((i - self.threshold) << self.shifter) + self.threshold + 3
				}
			})
			.collect_vec()
	}
}


/// A 9-bit sliding window over control-flag bytes.
///
/// Refilling loads `byte + 0x100`; the leading 1 is a sentinel so that
/// exhaustion shows up unambiguously as the value reaching zero.  Bits are
/// consumed from the least-significant end; the shift that empties the
/// register consumed the sentinel itself, which is never returned as data.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagWindow {
	window: u16,
}


impl FlagWindow {
	const SENTINEL: u16 = 0x100;


	/// Load the next flag byte.  The caller invokes this whenever
	/// [`FlagWindow::next_flag`] reports exhaustion.
	pub fn refill(&mut self, byte: u8) {
		self.window = u16::from(byte) + Self::SENTINEL;
	}


	/// Extract the next flag bit, or `None` when the window is exhausted and
	/// must be refilled from the next unread input byte.
	pub fn next_flag(&mut self) -> Option<bool> {
		if self.window == 0 {
			return None;
		};

		let carry = self.window & 1 != 0;
		self.window >>= 1;

		if self.window == 0 {
			// The bit just shifted out was the sentinel, not a flag.
			return None;
		};

		Some(carry)
	}
}


#[derive(Debug)]
enum BzzReaderState {
	/// Buffering the first bytes: streams of at most `RAW_LIMIT` bytes are
	/// stored raw, so nothing can be decided before the 10th byte or EOF.
	Prologue,
	/// A flag step is pending; the next byte is either a flag refill, a
	/// literal, or the high half of a distance field.
	NextStep,
	/// Got the high distance byte, awaiting the low one.
	DistanceLow(u8),
	/// All flag steps served; remaining input is the overflow tail.
	Tail,
}


/// Decoder for a single BZZ stream.
///
/// Layout: one method descriptor byte, a 3-byte big-endian flag count
/// (steps = count + 1), then flag bytes interleaved with literal bytes and
/// 2-byte big-endian back-reference distance fields.  Each flag bit selects
/// literal copy (1) or back-reference copy (0); back-references read from
/// the already-decoded output one byte at a time, so overlapping copies
/// replicate a repeating pattern.  Input of at most 9 bytes is passed
/// through unchanged.
pub struct BzzReader {
	state: BzzReaderState,
	include_trailing_bytes: bool,
	prologue: Vec<u8>,
	flags: FlagWindow,
	steps_left: u32,
	len_bits: u8,
	index_mask: u16,
	len_table: Vec<u16>,
	history: Vec<u8>,
	overflow: Vec<u8>,
}


impl BzzReader {
	/// Streams up to this many bytes are stored raw, not compressed.
	pub const RAW_LIMIT: usize = 9;


	/// Create a reader with an explicit trailing-byte policy: `true` appends
	/// any input left after the last flag step to the output (single-stream
	/// behavior), `false` collects it separately for
	/// [`BzzReader::into_overflow`] (archive behavior).
	pub fn with_trailing_bytes(include_trailing_bytes: bool) -> Self {
		Self { include_trailing_bytes, .. Self::new() }
	}


	/// The unconsumed tail, if any, collected while decoding with
	/// `include_trailing_bytes` disabled.
	pub fn into_overflow(self) -> Option<Vec<u8>> {
		if self.overflow.is_empty() {
			None
		} else {
			Some(self.overflow)
		}
	}


	fn emit<W: Write>(&mut self, byte: u8, output: &mut W) -> BzzResult<()> {
		output.write_byte(byte)?;
		self.history.push(byte);
		Ok(())
	}


	fn step_done(&mut self) {
		self.steps_left -= 1;

		self.state = if self.steps_left == 0 {
			BzzReaderState::Tail
		} else {
			BzzReaderState::NextStep
		};
	}


	/// The 10th byte has arrived: commit to the compressed layout, parse the
	/// buffered prologue and replay its payload bytes through the machine.
	fn begin_stream<W: Write>(&mut self, output: &mut W) -> BzzResult<usize> {
		let method = MethodDescriptor::from_byte(self.prologue[0]);
		let count = (u32::from(self.prologue[1]) << 16)
			| (u32::from(self.prologue[2]) << 8)
			| u32::from(self.prologue[3]);

		self.len_bits = method.len_bits;
		self.index_mask = method.len_mask - 1;
		self.len_table = method.length_table();
		self.steps_left = count + 1;
		self.state = BzzReaderState::NextStep;

		tracing::debug!(
			"bzz stream: shifter={} len_bits={} len_mask={:#04x} threshold={:#04x} steps={}",
			method.shifter, method.len_bits, method.len_mask, method.threshold, self.steps_left,
		);

		let pending = std::mem::take(&mut self.prologue);
		let mut written: usize = 0;

		for byte in pending.into_iter().skip(4) {
			match self.step_byte(byte, output) {
				Ok(bytes) => written += bytes,
				Err(Waiting) => (),
				Err(e) => return Err(e),
			};
		}

		Ok(written)
	}


	fn step_byte<W: Write>(&mut self, input: u8, output: &mut W) -> BzzResult<usize> {
		match self.state {
			BzzReaderState::Prologue => Err(Waiting),

			BzzReaderState::NextStep => {
				match self.flags.next_flag() {
					// Window exhausted: this byte is a flag refill.  The
					// pending step retries on the next byte without touching
					// the step counter.
					None => {
						self.flags.refill(input);
						Err(Waiting)
					},

					// Literal: the byte goes to the output verbatim.
					Some(true) => {
						self.emit(input, output)?;
						self.step_done();
						Ok(1)
					},

					// Back-reference: this byte is the high half of the
					// distance field.
					Some(false) => {
						self.state = BzzReaderState::DistanceLow(input);
						Err(Waiting)
					},
				}
			},

			BzzReaderState::DistanceLow(high) => {
				let distance = u16::from_be_bytes([high, input]);

				let masked = distance & self.index_mask;
				if masked == 0 {
					return Err(InvalidLengthIndex);
				};
				let length = usize::from(self.len_table[usize::from(masked - 1)]);

				let displacement = usize::from(distance >> self.len_bits);
				if displacement == 0 {
					return Err(InvalidDisplacement);
				};

				let history_len = self.history.len();
				if displacement > history_len {
					return Err(CopyOutOfRange);
				};
				let start = history_len - displacement;

				tracing::trace!(
					"backref: distance={:#06x} displacement={} length={} at={}",
					distance, displacement, length, history_len,
				);

				// Byte at a time on purpose: when displacement < length the
				// copy must read bytes it has just appended.
				for i in 0..length {
					let byte = self.history[start + i];
					self.emit(byte, output)?;
				}

				self.step_done();
				Ok(length)
			},

			BzzReaderState::Tail => {
				if self.include_trailing_bytes {
					output.write_byte(input)?;
					Ok(1)
				} else {
					self.overflow.push(input);
					Err(Waiting)
				}
			},
		}
	}
}


impl Default for BzzReader {
	fn default() -> Self {
		Self {
			state: BzzReaderState::Prologue,
			include_trailing_bytes: true,
			prologue: Vec::with_capacity(Self::RAW_LIMIT + 1),
			flags: FlagWindow::default(),
			steps_left: 0,
			len_bits: 0,
			index_mask: 0,
			len_table: Vec::new(),
			history: Vec::new(),
			overflow: Vec::new(),
		}
	}
}


impl Algorithm for BzzReader {
	fn filter_byte<W: Write>(&mut self, input: u8, output: &mut W) -> BzzResult<usize> {
		if matches!(self.state, BzzReaderState::Prologue) {
			self.prologue.push(input);

			if self.prologue.len() <= Self::RAW_LIMIT {
				return Err(Waiting);
			};

			return self.begin_stream(output);
		};

		self.step_byte(input, output)
	}


	fn finish<W: Write>(&mut self, output: &mut W) -> BzzResult<usize> {
		match self.state {
			// The whole input fit in the prologue buffer: it was never
			// compressed, flush it verbatim.
			BzzReaderState::Prologue => {
				let pending = std::mem::take(&mut self.prologue);

				for byte in &pending {
					output.write_byte(*byte)?;
				}

				self.state = BzzReaderState::Tail;
				Ok(pending.len())
			},

			BzzReaderState::Tail => Ok(0),

			// EOF while a flag step, a literal or a distance field was
			// still pending.
			_ => Err(TruncatedStream),
		}
	}
}


/// A fully decoded stream: the primary output plus the unconsumed tail, if
/// the reader was configured to keep it separate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BzzOutput {
	pub data: Vec<u8>,
	pub overflow: Option<Vec<u8>>,
}


/// Decode one in-memory BZZ stream.  On failure no partial output is
/// returned.
pub fn decompress(input: &[u8], include_trailing_bytes: bool) -> BzzResult<BzzOutput> {
	let mut reader = BzzReader::with_trailing_bytes(include_trailing_bytes);
	let data = reader.filter_slice_to_vec(input)?;

	Ok(BzzOutput { data, overflow: reader.into_overflow() })
}


/// The fixed-layout header of a multi-file BZZ container.
///
/// The file-entry triplets are opaque and the checksum region is read but
/// never validated; the compressed payload starts at
/// [`ArchiveHeader::PAYLOAD_OFFSET`] regardless of how much header was
/// actually consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
	pub version: u32,
	pub identifier: u32,
	pub file_count: u32,
	pub entries: Vec<(u32, u32, u32)>,
	pub checksum: [u8; 4],
	pub payload_offset: usize,
}


impl ArchiveHeader {
	pub const PAYLOAD_OFFSET: usize = 0x800;


	pub fn parse(input: &[u8]) -> BzzResult<Self> {
		let version = read_u32_le(input, 0)?;
		let identifier = read_u32_le(input, 4)?;
		let file_count = read_u32_le(input, 8)?;

		let checksum_offset = (file_count as usize).checked_mul(12)
			.and_then(|n| n.checked_add(12))
			.ok_or(TruncatedHeader)?;
		let header_size = checksum_offset.checked_add(4).ok_or(TruncatedHeader)?;
		if input.len() < header_size {
			return Err(TruncatedHeader);
		};

		let mut entries = Vec::with_capacity(file_count as usize);
		for i in 0..file_count as usize {
			let at = 12 + i * 12;
			entries.push((
				read_u32_le(input, at)?,
				read_u32_le(input, at + 4)?,
				read_u32_le(input, at + 8)?,
			));
		}

		let checksum = [
			input[checksum_offset],
			input[checksum_offset + 1],
			input[checksum_offset + 2],
			input[checksum_offset + 3],
		];

		Ok(Self {
			version,
			identifier,
			file_count,
			entries,
			checksum,
			payload_offset: Self::PAYLOAD_OFFSET,
		})
	}
}


fn read_u32_le(input: &[u8], offset: usize) -> BzzResult<u32> {
	match input.get(offset..offset + 4) {
		Some(b) => Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
		None => Err(TruncatedHeader),
	}
}


/// Decode a multi-file container: parse the header, slice the payload at the
/// fixed offset and decode it, keeping the unconsumed tail separate.
pub fn decompress_archive(input: &[u8]) -> BzzResult<(ArchiveHeader, BzzOutput)> {
	let header = ArchiveHeader::parse(input)?;

	if input.len() < header.payload_offset {
		return Err(TruncatedHeader);
	};

	let output = decompress(&input[header.payload_offset..], false)?;
	Ok((header, output))
}


#[test]
fn test_method_descriptor() {
	for byte in 0..=255u8 {
		let method = MethodDescriptor::from_byte(byte);

		assert_eq!(method.shifter, (byte >> 3) & 0x03);
		assert_eq!(method.len_bits, (byte & 0x07) ^ 0x07);
		assert!(method.len_bits <= 7);
		assert_eq!(method.len_mask, 1u16 << method.len_bits);

		let table = method.length_table();
		assert_eq!(table.len(), usize::from(method.len_mask));

		for pair in table.windows(2) {
			assert!(pair[0] <= pair[1]);
		}

		let linear_end = std::cmp::min(usize::from(method.threshold), table.len() - 1);
		for (i, entry) in table.iter().enumerate().take(linear_end + 1) {
			assert_eq!(usize::from(*entry), i + 3);
		}
	}

	// The worked example from the format notes: descriptor 0x00.
	let method = MethodDescriptor::from_byte(0x00);
	assert_eq!(method.shifter, 0);
	assert_eq!(method.len_bits, 7);
	assert_eq!(method.len_mask, 128);
	assert_eq!(method.threshold, 0x13);

	// len_bits 0 degenerates to a single-entry table.
	let method = MethodDescriptor::from_byte(0x07);
	assert_eq!(method.len_bits, 0);
	assert_eq!(method.length_table(), vec![3]);

	// Above the threshold the shifter stretches entries.
	let method = MethodDescriptor::from_byte(0x18);
	assert_eq!(method.shifter, 3);
	let table = method.length_table();
	let threshold = usize::from(method.threshold);
	assert_eq!(usize::from(table[threshold + 1]), (1 << 3) + threshold + 3);
}


#[test]
fn test_flag_window() {
	let mut window = FlagWindow::default();
	assert!(matches!(window.next_flag(), None));

	// Every refill byte yields exactly its 8 bits, least-significant first,
	// and the sentinel is never surfaced as a flag.
	for byte in 0..=255u8 {
		window.refill(byte);

		for bit in 0..8 {
			assert_eq!(window.next_flag(), Some((byte >> bit) & 1 != 0));
		}

		assert!(matches!(window.next_flag(), None));
		assert!(matches!(window.next_flag(), None));
	}
}


#[test]
fn test_raw_passthrough() {
	// Up to RAW_LIMIT bytes the stream is stored raw.
	for len in 0..=BzzReader::RAW_LIMIT {
		let input = (0..len as u8).collect_vec();
		let output = BzzReader::new().filter_slice_to_vec(&input[..]).unwrap();
		assert_eq!(output, input);
	}

	let raw = vec![0x00, 0x00, 0x00, 0x00, 0x01, 0x42, 1, 2, 3];
	let result = decompress(&raw, true).unwrap();
	assert_eq!(result.data, raw);
	assert!(result.overflow.is_none());
}


#[test]
fn test_literal_and_backref() {
	// descriptor 0x00, 4 steps, flags 1,1,0,1: "AB" + copy(disp 2, len 4) + "C".
	let input = vec![0x00, 0x00, 0x00, 0x03, 0x0B, 0x41, 0x42, 0x01, 0x02, 0x43];
	let wanted = vec![0x41, 0x42, 0x41, 0x42, 0x41, 0x42, 0x43];

	let output = BzzReader::new().filter_slice_to_vec(&input[..]).unwrap();
	assert_eq!(output, wanted);

	// Same stream through the byte-oriented source path.
	let mut reader = BzzReader::new();
	let mut output = Vec::new();
	let written = reader
		.filter_to_end(&mut std::io::Cursor::new(&input[..]), &mut output)
		.unwrap();
	assert_eq!(written, wanted.len());
	assert_eq!(output, wanted);
}


#[test]
fn test_overlapping_backref() {
	// "A" + copy(disp 1, len 5) + "B" + "C": each appended byte becomes its
	// own next source, so the single A replicates five more times.
	let input = vec![0x00, 0x00, 0x00, 0x03, 0x0D, 0x41, 0x00, 0x83, 0x42, 0x43];
	let output = BzzReader::new().filter_slice_to_vec(&input[..]).unwrap();
	assert_eq!(output, vec![0x41, 0x41, 0x41, 0x41, 0x41, 0x41, 0x42, 0x43]);
}


#[test]
fn test_flag_refill_boundary() {
	// 9 literal steps: the first flag byte (0xFF) carries 8 flags, so the
	// 9th step must trigger exactly one refill consuming 0x01, after which
	// 0x49 is decoded as a literal.
	let input = vec![
		0x00, 0x00, 0x00, 0x08, 0xFF,
		0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48,
		0x01, 0x49,
	];
	let output = BzzReader::new().filter_slice_to_vec(&input[..]).unwrap();
	assert_eq!(output, vec![0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49]);
}


#[test]
fn test_single_literal_scenario() {
	// One flag step (count 0x000000), flag byte 0x01 so the first consumed
	// bit is 1, one literal 0x42, then four tail bytes so the stream clears
	// the raw-copy threshold.
	let input = vec![0x00, 0x00, 0x00, 0x00, 0x01, 0x42, 0xDE, 0xAD, 0xBE, 0xEF];

	let result = decompress(&input, false).unwrap();
	assert_eq!(result.data, vec![0x42]);
	assert_eq!(result.overflow, Some(vec![0xDE, 0xAD, 0xBE, 0xEF]));

	let result = decompress(&input, true).unwrap();
	assert_eq!(result.data, vec![0x42, 0xDE, 0xAD, 0xBE, 0xEF]);
	assert!(result.overflow.is_none());
}


#[test]
fn test_trailing_bytes_modes() {
	let mut input = vec![0x00, 0x00, 0x00, 0x03, 0x0B, 0x41, 0x42, 0x01, 0x02, 0x43];
	input.extend_from_slice(&[0xDE, 0xAD]);
	let decoded = vec![0x41, 0x42, 0x41, 0x42, 0x41, 0x42, 0x43];

	let result = decompress(&input, true).unwrap();
	let mut appended = decoded.clone();
	appended.extend_from_slice(&[0xDE, 0xAD]);
	assert_eq!(result.data, appended);
	assert!(result.overflow.is_none());

	let result = decompress(&input, false).unwrap();
	assert_eq!(result.data, decoded);
	assert_eq!(result.overflow, Some(vec![0xDE, 0xAD]));

	// An exactly-consumed stream has no overflow in either mode.
	let exact = vec![0x00, 0x00, 0x00, 0x03, 0x0B, 0x41, 0x42, 0x01, 0x02, 0x43];
	assert!(decompress(&exact, false).unwrap().overflow.is_none());
}


#[test]
fn test_truncated_streams() {
	// 7 literal steps then a back-reference; valid up to the distance field.
	let valid = vec![
		0x00, 0x00, 0x00, 0x07, 0x7F,
		0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47,
		0x04, 0x01,
	];
	assert!(BzzReader::new().filter_slice_to_vec(&valid[..]).is_ok());

	// Cut before the distance field, and between its two bytes.
	for cut in [12, 13] {
		let result = BzzReader::new().filter_slice_to_vec(&valid[..cut]);
		assert!(matches!(result, Err(TruncatedStream)));
	}

	let refill = vec![
		0x00, 0x00, 0x00, 0x08, 0xFF,
		0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48,
		0x01, 0x49,
	];
	// Ends before the refill byte, and right after it (literal missing).
	for cut in [13, 14] {
		let result = BzzReader::new().filter_slice_to_vec(&refill[..cut]);
		assert!(matches!(result, Err(TruncatedStream)));
	}

	// Six steps wanted, flags for six, but only five literals present.
	let short = vec![
		0x00, 0x00, 0x00, 0x05, 0x3F,
		0x41, 0x42, 0x43, 0x44, 0x45,
	];
	let result = BzzReader::new().filter_slice_to_vec(&short[..]);
	assert!(matches!(result, Err(TruncatedStream)));
}


#[test]
fn test_invalid_backrefs() {
	let prefix = vec![
		0x00, 0x00, 0x00, 0x07, 0x7F,
		0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47,
	];

	// Masked index 0 has no table entry.
	let mut input = prefix.clone();
	input.extend_from_slice(&[0x01, 0x00]);
	let result = BzzReader::new().filter_slice_to_vec(&input[..]);
	assert!(matches!(result, Err(InvalidLengthIndex)));

	// Displacement of zero.
	let mut input = prefix.clone();
	input.extend_from_slice(&[0x00, 0x05]);
	let result = BzzReader::new().filter_slice_to_vec(&input[..]);
	assert!(matches!(result, Err(InvalidDisplacement)));

	// Displacement reaching before the start of the output (8 > 7 decoded).
	let mut input = prefix.clone();
	input.extend_from_slice(&[0x04, 0x01]);
	let result = BzzReader::new().filter_slice_to_vec(&input[..]);
	assert!(matches!(result, Err(CopyOutOfRange)));
}


#[test]
fn test_idempotent_decode() {
	let input = vec![0x00, 0x00, 0x00, 0x03, 0x0D, 0x41, 0x00, 0x83, 0x42, 0x43];

	let first = decompress(&input, true).unwrap();
	let second = decompress(&input, true).unwrap();
	assert_eq!(first, second);
}


#[test]
fn test_archive() {
	let mut archive = Vec::new();
	archive.extend_from_slice(&2u32.to_le_bytes());
	archive.extend_from_slice(&0x5A5A_4242u32.to_le_bytes());
	archive.extend_from_slice(&2u32.to_le_bytes());
	for entry in [(0x10u32, 0x20u32, 0x30u32), (0x40, 0x50, 0x60)] {
		archive.extend_from_slice(&entry.0.to_le_bytes());
		archive.extend_from_slice(&entry.1.to_le_bytes());
		archive.extend_from_slice(&entry.2.to_le_bytes());
	}
	archive.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
	archive.resize(ArchiveHeader::PAYLOAD_OFFSET, 0);
	archive.extend_from_slice(&[0x00, 0x00, 0x00, 0x03, 0x0B, 0x41, 0x42, 0x01, 0x02, 0x43]);

	let (header, output) = decompress_archive(&archive).unwrap();
	assert_eq!(header.version, 2);
	assert_eq!(header.identifier, 0x5A5A_4242);
	assert_eq!(header.file_count, 2);
	assert_eq!(header.entries, vec![(0x10, 0x20, 0x30), (0x40, 0x50, 0x60)]);
	assert_eq!(header.checksum, [0xAA, 0xBB, 0xCC, 0xDD]);
	assert_eq!(header.payload_offset, ArchiveHeader::PAYLOAD_OFFSET);
	assert_eq!(output.data, vec![0x41, 0x42, 0x41, 0x42, 0x41, 0x42, 0x43]);
	assert!(output.overflow.is_none());

	// The header parse itself does not need the full 0x800 bytes.
	let header = ArchiveHeader::parse(&archive[..40]).unwrap();
	assert_eq!(header.file_count, 2);

	// Archive decoding does.
	let result = decompress_archive(&archive[..40]);
	assert!(matches!(result, Err(TruncatedHeader)));
}


#[test]
fn test_truncated_headers() {
	assert!(matches!(ArchiveHeader::parse(&[]), Err(TruncatedHeader)));
	assert!(matches!(ArchiveHeader::parse(&[0u8; 11]), Err(TruncatedHeader)));

	// A file count the input cannot possibly hold.
	let mut huge = Vec::new();
	huge.extend_from_slice(&1u32.to_le_bytes());
	huge.extend_from_slice(&0u32.to_le_bytes());
	huge.extend_from_slice(&u32::MAX.to_le_bytes());
	huge.resize(100, 0);
	assert!(matches!(ArchiveHeader::parse(&huge), Err(TruncatedHeader)));
}
