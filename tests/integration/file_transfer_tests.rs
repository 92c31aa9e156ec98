//! File listing, chunked download, checksum and storage guards over the wire.

use crate::mock_hw::Harness;
use rhythmbadge::rpc::messages::{FileName, Request, Response, Timestamp};

fn with_files(files: &[(&str, &[u8])]) -> Harness {
    let mut h = Harness::new();
    for (i, (name, data)) in files.iter().enumerate() {
        h.hw.store_mut()
            .insert(name.as_bytes(), data, 1_000 + i as u32)
            .unwrap();
    }
    h
}

fn one(responses: Vec<Response>) -> Response {
    assert_eq!(responses.len(), 1, "expected exactly one response");
    responses.into_iter().next().unwrap()
}

fn start_mic(h: &mut Harness) {
    one(h.exchange(&Request::StartMicrophone {
        timestamp: Timestamp { seconds: 10, ms: 0 },
        mode: 0,
    }));
}

// ── Listing ───────────────────────────────────────────────────

#[test]
fn listing_pages_through_directory() {
    let mut h = with_files(&[
        ("A.DAT", b"a"),
        ("B.DAT", b"bb"),
        ("C.DAT", b"ccc"),
        ("D.DAT", b"dddd"),
        ("E.DAT", b"eeeee"),
    ]);

    let Response::ListFiles(listing) = one(h.exchange(&Request::ListFiles {
        start_index: 2,
        max_files: 3,
    })) else {
        panic!("expected a listing");
    };

    assert_eq!(listing.total_files, 5);
    assert_eq!(listing.start_index, 2);
    let names: Vec<&[u8]> = listing.entries.iter().map(|e| e.name.as_bytes()).collect();
    assert_eq!(names, vec![&b"C.DAT"[..], &b"D.DAT"[..], &b"E.DAT"[..]]);
    assert_eq!(listing.entries[0].size, 3);
    assert_eq!(listing.entries[0].timestamp, 1_002);
}

#[test]
fn listing_never_exceeds_three_entries() {
    let mut h = with_files(&[
        ("A.DAT", b"a"),
        ("B.DAT", b"b"),
        ("C.DAT", b"c"),
        ("D.DAT", b"d"),
    ]);

    let Response::ListFiles(listing) = one(h.exchange(&Request::ListFiles {
        start_index: 0,
        max_files: 200,
    })) else {
        panic!("expected a listing");
    };
    assert_eq!(listing.entries.len(), 3);
    assert_eq!(listing.total_files, 4);
}

#[test]
fn listing_of_unavailable_card_is_empty() {
    let mut h = with_files(&[("A.DAT", b"a")]);
    h.hw.store_mut().set_available(false);

    let Response::ListFiles(listing) = one(h.exchange(&Request::ListFiles {
        start_index: 0,
        max_files: 3,
    })) else {
        panic!("expected a listing");
    };
    assert_eq!(listing.total_files, 0);
    assert!(listing.entries.is_empty());
    assert_eq!(h.engine.transport().disconnects, 0);
}

// ── Download ──────────────────────────────────────────────────

#[test]
fn download_streams_file_in_chunks() {
    let data: Vec<u8> = (0..40u8).collect();
    let mut h = with_files(&[("MIC0001.DAT", &data)]);

    let start = one(h.exchange(&Request::StartDownload {
        filename: FileName::new(b"MIC0001.DAT"),
    }));
    assert_eq!(
        start,
        Response::StartDownload {
            file_size: 40,
            total_chunks: 3,
            success: true,
        }
    );

    let mut received = Vec::new();
    for index in 0..3u32 {
        let Response::DownloadChunk(chunk) =
            one(h.exchange(&Request::DownloadChunk { chunk_index: index }))
        else {
            panic!("expected a chunk");
        };
        assert_eq!(chunk.chunk_index, index);
        let expected_size = if index == 2 { 8 } else { 16 };
        assert_eq!(usize::from(chunk.chunk_size), expected_size);
        assert_eq!(chunk.is_last, index == 2);
        received.extend_from_slice(&chunk.data[..usize::from(chunk.chunk_size)]);
    }
    assert_eq!(received, data);
}

#[test]
fn chunk_past_end_is_empty_and_last() {
    let mut h = with_files(&[("SHORT.DAT", b"0123456789")]);
    one(h.exchange(&Request::StartDownload {
        filename: FileName::new(b"SHORT.DAT"),
    }));

    let Response::DownloadChunk(chunk) =
        one(h.exchange(&Request::DownloadChunk { chunk_index: 9 }))
    else {
        panic!("expected a chunk");
    };
    assert_eq!(chunk.chunk_size, 0);
    assert!(chunk.is_last);
}

#[test]
fn chunk_without_download_is_empty() {
    let mut h = Harness::new();
    let Response::DownloadChunk(chunk) =
        one(h.exchange(&Request::DownloadChunk { chunk_index: 0 }))
    else {
        panic!("expected a chunk");
    };
    assert_eq!(chunk.chunk_size, 0);
    assert!(!chunk.is_last);
}

#[test]
fn download_of_missing_file_fails() {
    let mut h = Harness::new();
    assert_eq!(
        one(h.exchange(&Request::StartDownload {
            filename: FileName::new(b"GHOST.DAT"),
        })),
        Response::StartDownload {
            file_size: 0,
            total_chunks: 0,
            success: false,
        }
    );
}

#[test]
fn download_refused_while_sampling() {
    let mut h = with_files(&[("A.DAT", b"abc")]);
    start_mic(&mut h);

    assert_eq!(
        one(h.exchange(&Request::StartDownload {
            filename: FileName::new(b"A.DAT"),
        })),
        Response::StartDownload {
            file_size: 0,
            total_chunks: 0,
            success: false,
        }
    );
    assert!(!h.service.download().is_open());
}

// ── Checksum ──────────────────────────────────────────────────

#[test]
fn checksum_is_crc32_of_contents() {
    let mut h = with_files(&[("CHECK.TXT", b"123456789")]);
    assert_eq!(
        one(h.exchange(&Request::FileChecksum {
            filename: FileName::new(b"CHECK.TXT"),
        })),
        Response::FileChecksum {
            checksum: 0xCBF4_3926,
            success: true,
        }
    );
    assert_eq!(h.hw.store().open_handles(), 0);
}

#[test]
fn checksum_refused_while_sampling() {
    let mut h = with_files(&[("CHECK.TXT", b"123456789")]);
    start_mic(&mut h);
    let before = h.hw.store().calls();

    assert_eq!(
        one(h.exchange(&Request::FileChecksum {
            filename: FileName::new(b"CHECK.TXT"),
        })),
        Response::FileChecksum {
            checksum: 0,
            success: false,
        }
    );
    assert_eq!(h.hw.store().calls().open, before.open);
    assert_eq!(h.hw.store().open_handles(), 0);
}

#[test]
fn checksum_of_missing_file_fails() {
    let mut h = Harness::new();
    assert_eq!(
        one(h.exchange(&Request::FileChecksum {
            filename: FileName::new(b"NOPE.TXT"),
        })),
        Response::FileChecksum {
            checksum: 0,
            success: false,
        }
    );
}

// ── Free space and erase ──────────────────────────────────────

#[test]
fn free_space_reports_kib() {
    let mut h = with_files(&[("BIG.DAT", &[0u8; 3000])]);
    match one(h.exchange(&Request::FreeSpace)) {
        Response::FreeSpace {
            total_space,
            free_space,
            ..
        } => {
            assert_eq!(total_space, 1024);
            assert_eq!(free_space, 1021);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn free_space_is_zero_while_sampling() {
    let mut h = Harness::new();
    start_mic(&mut h);
    // Starting the sampler queries the card itself; count from here.
    let before = h.hw.store().calls();

    match one(h.exchange(&Request::FreeSpace)) {
        Response::FreeSpace {
            total_space,
            free_space,
            ..
        } => {
            assert_eq!(total_space, 0);
            assert_eq!(free_space, 0);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.hw.store().calls(), before);
}

#[test]
fn erase_clears_card() {
    let mut h = with_files(&[("A.DAT", b"a"), ("B.DAT", b"b")]);
    match one(h.exchange(&Request::EraseAll)) {
        Response::EraseAll { done, .. } => assert!(done),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.hw.store().file_count(), 0);
}

#[test]
fn erase_refused_while_sampling() {
    let mut h = with_files(&[("A.DAT", b"a")]);
    start_mic(&mut h);
    let before = h.hw.store().calls();

    match one(h.exchange(&Request::EraseAll)) {
        Response::EraseAll { done, .. } => assert!(!done),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.hw.store().file_count(), 1);
    assert_eq!(h.hw.store().calls().erase_all, before.erase_all);
}

#[test]
fn erase_allowed_after_sampling_stops() {
    let mut h = with_files(&[("A.DAT", b"a")]);
    start_mic(&mut h);
    assert!(h.exchange(&Request::StopMicrophone).is_empty());

    match one(h.exchange(&Request::EraseAll)) {
        Response::EraseAll { done, .. } => assert!(done),
        other => panic!("unexpected {other:?}"),
    }
}
