#![no_main]
use libfuzzer_sys::fuzz_target;
use bzz_compression::{decompress_archive, ArchiveHeader};


fuzz_target!(|data: &[u8]| {
	// Must never panic or read out of bounds, whatever the header claims.
	if let Ok(header) = ArchiveHeader::parse(data) {
		assert_eq!(header.entries.len(), header.file_count as usize);
		assert_eq!(header.payload_offset, ArchiveHeader::PAYLOAD_OFFSET);

		// Parsing is pure: a second pass sees the same header.
		let again = ArchiveHeader::parse(data).unwrap();
		assert_eq!(header, again);
	};

	let _ = decompress_archive(data);
});
