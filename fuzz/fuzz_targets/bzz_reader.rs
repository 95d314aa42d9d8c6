#![no_main]
use libfuzzer_sys::fuzz_target;
use bzz_compression::{Algorithm, BzzError, BzzReader};

use BzzError::*;


/// Straightforward cursor-over-a-slice rendition of the BZZ decode loop,
/// kept independent of the streaming reader so the two can disagree.
fn decompress_bzz_slice(input: &[u8], include_trailing: bool) -> Result<(Vec<u8>, Vec<u8>), BzzError> {
	if input.len() <= 9 {
		return Ok((input.to_vec(), Vec::new()));
	};

	let shifter = (input[0] >> 3) & 0x03;
	let len_bits = (input[0] & 0x07) ^ 0x07;
	let len_mask: u16 = 1 << len_bits;
	let mut threshold: u16 = len_mask >> 1;
	if threshold > 0x07 {
		threshold = 0x13;
	};

	let len_table: Vec<u16> = (0..len_mask)
		.map(|i| {
			if i <= threshold {
				i + 3
			} else {
				((i - threshold) << shifter) + threshold + 3
			}
		})
		.collect();

	let mut steps = ((u32::from(input[1]) << 16)
		| (u32::from(input[2]) << 8)
		| u32::from(input[3])) + 1;

	let mut src: usize = 4;
	let mut window: u16 = 0;
	let mut out: Vec<u8> = Vec::new();

	while steps > 0 {
		let carry;
		loop {
			if window == 0 {
				if src >= input.len() {
					return Err(TruncatedStream);
				};
				window = u16::from(input[src]) + 0x100;
				src += 1;
			};

			let bit = window & 1 != 0;
			window >>= 1;

			if window != 0 {
				carry = bit;
				break;
			};
			// Shifted out the sentinel: refill and retry.
		}

		if carry {
			if src >= input.len() {
				return Err(TruncatedStream);
			};
			out.push(input[src]);
			src += 1;
		} else {
			if src + 2 > input.len() {
				return Err(TruncatedStream);
			};
			let distance = u16::from_be_bytes([input[src], input[src + 1]]);
			src += 2;

			let masked = distance & (len_mask - 1);
			if masked == 0 {
				return Err(InvalidLengthIndex);
			};
			let length = usize::from(len_table[usize::from(masked - 1)]);

			let displacement = usize::from(distance >> len_bits);
			if displacement == 0 {
				return Err(InvalidDisplacement);
			};
			if displacement > out.len() {
				return Err(CopyOutOfRange);
			};

			let start = out.len() - displacement;
			for i in 0..length {
				let byte = out[start + i];
				out.push(byte);
			}
		};

		steps -= 1;
	}

	if include_trailing {
		out.extend_from_slice(&input[src..]);
		Ok((out, Vec::new()))
	} else {
		Ok((out, input[src..].to_vec()))
	}
}


fuzz_target!(|input: (bool, &[u8])| {
	let (include_trailing, data) = input;

	let mut reader = BzzReader::with_trailing_bytes(include_trailing);
	let streamed = reader.filter_slice_to_vec(data);
	let reference = decompress_bzz_slice(data, include_trailing);

	match (streamed, reference) {
		(Ok(streamed_data), Ok((reference_data, reference_tail))) => {
			assert_eq!(streamed_data, reference_data);
			let streamed_tail = reader.into_overflow().unwrap_or_default();
			assert_eq!(streamed_tail, reference_tail);
		},
		(Err(streamed_err), Err(reference_err)) => {
			assert_eq!(format!("{:?}", streamed_err), format!("{:?}", reference_err));
		},
		(streamed, reference) => {
			panic!("streaming/reference disagreement: {:?} vs {:?}", streamed, reference);
		},
	};
});
