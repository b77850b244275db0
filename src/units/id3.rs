// src/units/id3.rs

//! Terminal unit for MP3 audio: the ID3v2 tag at the start, the first MPEG
//! frame header after it, and the ID3v1 tag in the last 128 bytes.
//!
//! People and albums are not literal values. A performer is recorded as an
//! anonymous URI in `performer`, with triplets giving the URI type
//! `Contact` and the `fullname`. The album is one anonymous URI per node,
//! shared by the album title, the track count, and the disc count.
//!
//! Attached pictures (`APIC` frames) become child nodes named `0`, `1`, …
//!
//! See <https://id3.org/id3v2.4.0-structure> and
//! <https://id3.org/ID3v1>.

use std::borrow::Cow;

use crate::analyzers::error::{AnalyzerError, ResultAnalyzer};
use crate::analyzers::units::{TerminalUnit, TerminalUnitFactory, UnitFactory};
use crate::common::ResultS3;
use crate::data::analysisresult::AnalysisResult;
use crate::data::fieldregister::{FieldP, FieldRegister};
use crate::readers::bufferedsource::BufferedSource;
use crate::readers::bytesource::ByteSource;

use ::encoding_rs::{UTF_16BE, UTF_16LE};
use ::si_trace_print::{defn, defo, defx};

pub const NAME_ID3: &str = "Id3Unit";

/// NUL padding some encoders put between the tag and the first frame.
const MAX_PADDING: usize = 1000;
/// A larger ID3v2 tag is not believed.
const MAX_TAG_SZ: usize = 5_000_000;
const ID3V2_HEADER_SZ: usize = 10;
const ID3V2_FRAME_HEADER_SZ: usize = 10;
const ID3V1_SZ: usize = 128;

pub const FIELD_CONTENTCREATED: &str = "contentCreated";
pub const FIELD_SUBJECT: &str = "subject";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_COMMENT: &str = "comment";
pub const FIELD_MUSICALBUM: &str = "musicAlbum";
pub const FIELD_GENRE: &str = "genre";
pub const FIELD_COMPOSER: &str = "composer";
pub const FIELD_PERFORMER: &str = "performer";
pub const FIELD_LYRICIST: &str = "lyricist";
pub const FIELD_PUBLISHER: &str = "publisher";
pub const FIELD_LANGUAGE: &str = "language";
pub const FIELD_COPYRIGHT: &str = "copyright";
pub const FIELD_TRACKNUMBER: &str = "trackNumber";
pub const FIELD_DISCNUMBER: &str = "discNumber";
pub const FIELD_DURATION: &str = "duration";
pub const FIELD_AVERAGEBITRATE: &str = "averageBitrate";
pub const FIELD_SAMPLERATE: &str = "sampleRate";
pub const FIELD_CODEC: &str = "codec";
pub const FIELD_CHANNELS: &str = "channels";

const FIELDS: [&str; 20] = [
    FIELD_CONTENTCREATED,
    FIELD_SUBJECT,
    FIELD_TITLE,
    FIELD_DESCRIPTION,
    FIELD_COMMENT,
    FIELD_MUSICALBUM,
    FIELD_GENRE,
    FIELD_COMPOSER,
    FIELD_PERFORMER,
    FIELD_LYRICIST,
    FIELD_PUBLISHER,
    FIELD_LANGUAGE,
    FIELD_COPYRIGHT,
    FIELD_TRACKNUMBER,
    FIELD_DISCNUMBER,
    FIELD_DURATION,
    FIELD_AVERAGEBITRATE,
    FIELD_SAMPLERATE,
    FIELD_CODEC,
    FIELD_CHANNELS,
];

pub const PREDICATE_TYPE: &str = "type";
pub const PREDICATE_FULLNAME: &str = "fullname";
pub const PREDICATE_TITLE: &str = "title";
pub const PREDICATE_ALBUMARTIST: &str = "albumArtist";
pub const PREDICATE_ALBUMTRACKCOUNT: &str = "albumTrackCount";
pub const PREDICATE_DISCCOUNT: &str = "discCount";

pub const CLASS_CONTACT: &str = "Contact";
pub const CLASS_MUSICALBUM: &str = "MusicAlbum";
pub const CLASS_MUSICPIECE: &str = "MusicPiece";
pub const CLASS_AUDIO: &str = "Audio";

/// MPEG-1 layer III bit rates by index, bits per second.
pub const BITRATES: [u32; 15] = [
    0, 32000, 40000, 48000, 56000, 64000, 80000, 96000, 112000, 128000, 160000, 192000, 224000,
    256000, 320000,
];
/// MPEG-1 sample rates by index, Hz.
pub const SAMPLERATES: [u32; 3] = [44100, 48000, 32000];

/// ID3v1 genres, by genre number.
pub const GENRES: [&str; 148] = [
    "Blues", "Classic Rock", "Country", "Dance", "Disco", "Funk", "Grunge", "Hip-Hop", "Jazz",
    "Metal", "New Age", "Oldies", "Other", "Pop", "R&B", "Rap", "Reggae", "Rock", "Techno",
    "Industrial", "Alternative", "Ska", "Death Metal", "Pranks", "Soundtrack", "Euro-Techno",
    "Ambient", "Trip-Hop", "Vocal", "Jazz+Funk", "Fusion", "Trance", "Classical", "Instrumental",
    "Acid", "House", "Game", "Sound Clip", "Gospel", "Noise", "Alternative Rock", "Bass", "Soul",
    "Punk", "Space", "Meditative", "Instrumental Pop", "Instrumental Rock", "Ethnic", "Gothic",
    "Darkwave", "Techno-Industrial", "Electronic", "Pop-Folk", "Eurodance", "Dream",
    "Southern Rock", "Comedy", "Cult", "Gangsta", "Top 40", "Christian Rap", "Pop/Funk", "Jungle",
    "Native American", "Cabaret", "New Wave", "Psychedelic", "Rave", "Showtunes", "Trailer",
    "Lo-Fi", "Tribal", "Acid Punk", "Acid Jazz", "Polka", "Retro", "Musical", "Rock & Roll",
    "Hard Rock", "Folk", "Folk/Rock", "National Folk", "Swing", "Fusion", "Bebop", "Latin",
    "Revival", "Celtic", "Bluegrass", "Avantgarde", "Gothic Rock", "Progressive Rock",
    "Psychedelic Rock", "Symphonic Rock", "Slow Rock", "Big Band", "Chorus", "Easy Listening",
    "Acoustic", "Humour", "Speech", "Chanson", "Opera", "Chamber Music", "Sonata", "Symphony",
    "Booty Bass", "Primus", "Porn Groove", "Satire", "Slow Jam", "Club", "Tango", "Samba",
    "Folklore", "Ballad", "Power Ballad", "Rhythmic Soul", "Freestyle", "Duet", "Punk Rock",
    "Drum Solo", "A Cappella", "Euro-House", "Dance Hall", "Goa", "Drum & Bass", "Club-House",
    "Hardcore", "Terror", "Indie", "BritPop", "Negerpunk", "Polsk Punk", "Beat",
    "Christian Gangsta Rap", "Heavy Metal", "Black Metal", "Crossover", "Contemporary Christian",
    "Christian Rock", "Merengue", "Salsa", "Thrash Metal", "Anime", "Jpop", "Synthpop",
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Count of leading NUL bytes of `buf`, at most `max`.
fn count_nul(buf: &[u8], max: usize) -> usize {
    buf.iter().take(max).take_while(|b| **b == 0).count()
}

/// Syncsafe integer: 7 bits per byte. `None` if any high bit is set.
pub fn read_syncsafe(b: &[u8]) -> Option<usize> {
    if b.len() < 4 || b[..4].iter().any(|c| c & 0x80 != 0) {
        return None;
    }

    Some(
        ((b[0] as usize) << 21)
            | ((b[1] as usize) << 14)
            | ((b[2] as usize) << 7)
            | (b[3] as usize),
    )
}

/// Frame size: syncsafe for ID3v2.4, big-endian before.
fn read_frame_size(b: &[u8], syncsafe: bool) -> Option<usize> {
    if syncsafe {
        return read_syncsafe(b);
    }
    let size = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);

    usize::try_from(size).ok()
}

/// Undo unsynchronisation: drop each `00` that follows an `ff`.
fn deunsync(data: &[u8]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::with_capacity(data.len());
    for (i, b) in data.iter().enumerate() {
        if i > 0 && *b == 0 && data[i - 1] == 0xff {
            continue;
        }
        out.push(*b);
    }

    out
}

/// ISO-8859-1 maps each byte to the code point of the same value.
fn decode_latin1(data: &[u8]) -> String {
    data.iter().map(|b| char::from(*b)).collect()
}

/// Decode ID3v2 text of encoding `enc`, up to the first NUL.
///
/// `0` ISO-8859-1, `1` UTF-16 with BOM, `2` UTF-16BE, `3` UTF-8. An unknown
/// encoding is read as ISO-8859-1.
pub fn decode_id3_text(enc: u8, data: &[u8]) -> String {
    let text: String = match enc {
        1 | 2 => {
            let (encoding, body) = match data {
                [0xff, 0xfe, rest @ ..] => (UTF_16LE, rest),
                [0xfe, 0xff, rest @ ..] => (UTF_16BE, rest),
                _ if enc == 2 => (UTF_16BE, data),
                _ => (UTF_16LE, data),
            };
            let (s, _had_errors) = encoding.decode_without_bom_handling(body);
            s.into_owned()
        }
        3 => String::from_utf8_lossy(data).into_owned(),
        _ => decode_latin1(data),
    };
    match text.find('\0') {
        Some(at) => String::from(&text[..at]),
        None => text,
    }
}

/// Offset just past the NUL terminating text of encoding `enc` in `data`.
fn text_end(enc: u8, data: &[u8]) -> Option<usize> {
    match enc {
        1 | 2 => data
            .chunks_exact(2)
            .position(|pair| pair == [0, 0])
            .map(|at| at * 2 + 2),
        _ => data.iter().position(|b| *b == 0).map(|at| at + 1),
    }
}

/// Leading integer of `s` after whitespace, like a C++ stream extraction.
pub fn parse_leading_int(s: &str) -> Option<i32> {
    let s = s.trim_start();
    let digits_at = match s.starts_with(['-', '+']) {
        true => 1,
        false => 0,
    };
    let end = s[digits_at..]
        .find(|c: char| !c.is_ascii_digit())
        .map(|at| at + digits_at)
        .unwrap_or(s.len());
    if end == digits_at {
        return None;
    }

    s[..end].parse::<i32>().ok()
}

/// Genre of a `TCON` value: a genre number, optionally in parentheses, or
/// free text.
pub fn genre_name(value: &str) -> &str {
    let inner = value
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .unwrap_or(value);
    if let Ok(n) = inner.parse::<usize>() {
        if let Some(genre) = GENRES.get(n) {
            return genre;
        }
    }

    value
}

/// Field of an ID3v1 tag at `offset`, NUL-terminated or `len` long, with
/// spaces trimmed. `None` when empty.
fn id3v1_field(buf: &[u8], offset: usize, len: usize) -> Option<String> {
    let field = &buf[offset..offset + len];
    if field[0] == 0 {
        return None;
    }
    let end = field.iter().position(|b| *b == 0).unwrap_or(len);
    let s = decode_latin1(&field[..end]);
    let s = s.trim_matches(' ');
    match s.is_empty() {
        true => None,
        false => Some(String::from(s)),
    }
}

/// MPEG frame header at the start of `buf`: `(bitrate index, samplerate
/// index, channel mode)`.
pub fn mpeg_frame_header(buf: &[u8]) -> Option<(usize, usize, u8)> {
    if buf.len() < 4 || buf[0] != 0xff || (buf[1] & 0xfe) != 0xfa {
        return None;
    }
    let bitrate_index = (buf[2] >> 4) as usize;
    let samplerate_index = ((buf[2] >> 2) & 3) as usize;
    if bitrate_index == 0xf || samplerate_index == 3 {
        return None;
    }

    Some((bitrate_index, samplerate_index, buf[3] >> 6))
}

/// Read at least `min`, at most `max` bytes as an owned buffer.
fn read_owned(input: &mut dyn ByteSource, min: usize, max: usize) -> ResultAnalyzer<Vec<u8>> {
    match input.read(min, max) {
        ResultS3::Found(data) => Ok(data.to_vec()),
        ResultS3::Done => Ok(Vec::with_capacity(0)),
        ResultS3::Err(err) => Err(AnalyzerError::Stream(err)),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Id3Unit
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tokens of the fields recorded by [`Id3Unit`].
struct Id3Fields {
    created: FieldP,
    subject: FieldP,
    title: FieldP,
    description: FieldP,
    comment: FieldP,
    album: FieldP,
    genre: FieldP,
    composer: FieldP,
    performer: FieldP,
    lyricist: FieldP,
    publisher: FieldP,
    language: FieldP,
    copyright: FieldP,
    track_number: FieldP,
    disc_number: FieldP,
    duration: FieldP,
    bitrate: FieldP,
    samplerate: FieldP,
    codec: FieldP,
    channels: FieldP,
    type_: FieldP,
}

/// What an ID3v2 tag held, for the ID3v1 fallbacks.
#[derive(Default)]
struct Found {
    title: bool,
    artist: bool,
    album: bool,
    year: bool,
    track: bool,
    genre: bool,
    tag: bool,
}

pub struct Id3Unit {
    fields: Id3Fields,
}

impl Id3Unit {
    /// The album URI of the node, created on first use.
    fn album_uri(result: &AnalysisResult<'_>, album_uri: &mut Option<String>) -> String {
        album_uri
            .get_or_insert_with(|| result.new_anonymous_uri())
            .clone()
    }

    /// Record a person as an anonymous `Contact` in `field`.
    fn add_contact(&self, result: &AnalysisResult<'_>, field: &FieldP, name: &str) {
        let uri = result.new_anonymous_uri();
        result.add_value(field, uri.as_str());
        result.add_triplet(&uri, PREDICATE_TYPE, CLASS_CONTACT);
        result.add_triplet(&uri, PREDICATE_FULLNAME, name);
    }

    /// Record text frame `id` with `value`.
    fn add_text_frame(
        &self,
        result: &AnalysisResult<'_>,
        id: &[u8],
        value: &str,
        album_uri: &mut Option<String>,
        found: &mut Found,
    ) {
        let f = &self.fields;
        match id {
            b"TIT1" => result.add_value(&f.subject, value),
            b"TIT2" => {
                result.add_value(&f.title, value);
                found.title = true;
            }
            b"TIT3" => result.add_value(&f.description, value),
            b"TLAN" => result.add_value(&f.language, value),
            b"TCOP" => result.add_value(&f.copyright, value),
            b"TDRL" | b"TDAT" | b"TYER" | b"TDRC" => {
                result.add_value(&f.created, value);
                found.year = true;
            }
            b"TPE1" | b"TPE3" | b"TPE4" => {
                self.add_contact(result, &f.performer, value);
                found.artist = true;
            }
            b"TPE2" => {
                let artist_uri = result.new_anonymous_uri();
                let album = Self::album_uri(result, album_uri);
                result.add_triplet(&album, PREDICATE_ALBUMARTIST, &artist_uri);
                result.add_triplet(&artist_uri, PREDICATE_TYPE, CLASS_CONTACT);
                result.add_triplet(&artist_uri, PREDICATE_FULLNAME, value);
            }
            b"TPUB" | b"TENC" => self.add_contact(result, &f.publisher, value),
            b"TALB" | b"TOAL" => {
                let album = Self::album_uri(result, album_uri);
                result.add_triplet(&album, PREDICATE_TITLE, value);
                found.album = true;
            }
            b"TCON" => {
                result.add_value(&f.genre, genre_name(value));
                found.genre = true;
            }
            b"TLEN" => result.add_value(&f.duration, value),
            b"TEXT" => self.add_contact(result, &f.lyricist, value),
            b"TCOM" => self.add_contact(result, &f.composer, value),
            b"TRCK" | b"TPOS" => {
                let (field, predicate) = match id {
                    b"TRCK" => (&f.track_number, PREDICATE_ALBUMTRACKCOUNT),
                    _ => (&f.disc_number, PREDICATE_DISCCOUNT),
                };
                let (num, count) = match value.split_once('/') {
                    Some((num, count)) => (num, Some(count)),
                    None => (value, None),
                };
                let num = match parse_leading_int(num) {
                    Some(val) => val,
                    None => return,
                };
                result.add_value(field, num);
                if id == b"TRCK" {
                    found.track = true;
                }
                if let Some(count) = count.and_then(parse_leading_int) {
                    let album = Self::album_uri(result, album_uri);
                    result.add_triplet(&album, predicate, &count.to_string());
                }
            }
            _ => {}
        }
    }

    /// Index the picture of `APIC` frame `data` as child `name`.
    ///
    /// `data` is: MIME type, NUL, picture type, description, NUL,
    /// picture bytes.
    fn index_picture(
        &self,
        result: &mut AnalysisResult<'_>,
        enc: u8,
        data: &[u8],
        name: &str,
    ) {
        let mime_end = match data.iter().position(|b| *b == 0) {
            Some(at) => at + 1,
            None => return,
        };
        // skip the picture type byte
        let desc_at = mime_end + 1;
        if desc_at >= data.len() {
            return;
        }
        let desc_len = match text_end(enc, &data[desc_at..]) {
            Some(val) => val,
            None => return,
        };
        let content_at = desc_at + desc_len;
        if content_at >= data.len() {
            return;
        }
        let description = decode_id3_text(enc, &data[desc_at..content_at]);
        defo!("picture {:?} {} bytes", name, data.len() - content_at);
        let source = BufferedSource::from_bytes(data[content_at..].to_vec());
        let mtime = result.mtime();
        result.index_child(name, mtime, Some(Box::new(source)));
        if !description.is_empty() {
            if let Some(child) = result.child() {
                child.add_value(&self.fields.description, description);
            }
        }
        result.finish_index_child();
    }

    /// Parse the frames of ID3v2 tag `tag`, the whole tag including its
    /// header.
    fn parse_id3v2(
        &self,
        result: &mut AnalysisResult<'_>,
        tag: &[u8],
        album_uri: &mut Option<String>,
        found: &mut Found,
    ) {
        let version = tag[3];
        let unsync = tag[5] & 0x80 != 0;
        let mut pictures: u8 = 0;
        let mut at: usize = ID3V2_HEADER_SZ;
        while at + ID3V2_FRAME_HEADER_SZ < tag.len() && tag[at] != 0 {
            let id = &tag[at..at + 4];
            let size = match read_frame_size(&tag[at + 4..at + 8], version >= 4) {
                Some(val) => val,
                None => break,
            };
            if size == 0 || size > tag.len() - at - ID3V2_FRAME_HEADER_SZ {
                defo!("frame {:?} size {} overruns the tag", id, size);
                break;
            }
            let enc = tag[at + ID3V2_FRAME_HEADER_SZ];
            let raw = &tag[at + ID3V2_FRAME_HEADER_SZ + 1..at + ID3V2_FRAME_HEADER_SZ + size];
            let data: Cow<'_, [u8]> = match unsync {
                true => Cow::Owned(deunsync(raw)),
                false => Cow::Borrowed(raw),
            };
            if id == b"APIC" {
                let name = char::from(b'0'.wrapping_add(pictures)).to_string();
                pictures = pictures.wrapping_add(1);
                self.index_picture(result, enc, &data, &name);
            } else if id[0] == b'T' {
                let value = decode_id3_text(enc, &data);
                if !value.is_empty() {
                    self.add_text_frame(result, id, &value, album_uri, found);
                }
            }
            at += size + ID3V2_FRAME_HEADER_SZ;
        }
    }

    /// Parse ID3v1 tag `buf`, recording only what the ID3v2 tag did not.
    fn parse_id3v1(
        &self,
        result: &AnalysisResult<'_>,
        buf: &[u8],
        album_uri: &mut Option<String>,
        found: &Found,
    ) {
        let f = &self.fields;
        if !found.title {
            if let Some(s) = id3v1_field(buf, 3, 30) {
                result.add_value(&f.title, s);
            }
        }
        if !found.artist {
            if let Some(s) = id3v1_field(buf, 33, 30) {
                self.add_contact(result, &f.performer, &s);
            }
        }
        if !found.album {
            if let Some(s) = id3v1_field(buf, 63, 30) {
                let album = Self::album_uri(result, album_uri);
                result.add_triplet(&album, PREDICATE_TITLE, &s);
            }
        }
        if !found.year {
            if let Some(s) = id3v1_field(buf, 93, 4) {
                result.add_value(&f.created, s);
            }
        }
        if let Some(s) = id3v1_field(buf, 97, 30) {
            result.add_value(&f.comment, s);
        }
        // ID3v1.1: a NUL then the track number ends the comment
        if !found.track && buf[125] == 0 && buf[126] != 0 {
            result.add_value(&f.track_number, i32::from(buf[126]));
        }
        if !found.genre {
            if let Some(genre) = GENRES.get(buf[127] as usize) {
                result.add_value(&f.genre, *genre);
            }
        }
    }
}

impl TerminalUnit for Id3Unit {
    fn name(&self) -> &str {
        NAME_ID3
    }

    /// An ID3v2 header of version 4 or less without unknown flags, or an
    /// MPEG-1 layer III frame header, after optional NUL padding.
    fn check_header(&self, header: &[u8]) -> bool {
        let i = count_nul(header, header.len());
        if header.len() < 6 + i {
            return false;
        }
        let h = &header[i..];
        if &h[..3] == b"ID3" && h[3] <= 4 && (h[5] & !0x80) == 0 {
            return true;
        }

        mpeg_frame_header(h).is_some()
    }

    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn ByteSource,
    ) -> ResultAnalyzer<()> {
        defn!("({:?})", result.path());
        let mut found = Found::default();
        let mut album_uri: Option<String> = None;

        // end of the ID3v2 tag; an ID3v1 tag is only looked for after it
        let mut tag_end: u64 = 0;
        let first = read_owned(input, ID3V2_HEADER_SZ + MAX_PADDING, ID3V2_HEADER_SZ + MAX_PADDING)?;
        // bytes after the ID3v2 tag, where the first frame is
        let after: Vec<u8> = if first.len() >= ID3V2_HEADER_SZ && first.starts_with(b"ID3") {
            let size = match read_syncsafe(&first[6..10]) {
                Some(val) if val <= MAX_TAG_SZ => val,
                _ => {
                    defx!("bad tag size");
                    return Err(AnalyzerError::format(NAME_ID3, "bad ID3v2 tag size"));
                }
            };
            let tag_sz = ID3V2_HEADER_SZ + size;
            if input.reset(0) != 0 {
                defx!("cannot reset");
                return Err(AnalyzerError::NotReseekable {
                    position: input.position(),
                });
            }
            let buf = read_owned(input, tag_sz, tag_sz + 4 + MAX_PADDING)?;
            if buf.len() < tag_sz {
                defx!("tag truncated; {} < {}", buf.len(), tag_sz);
                return Err(AnalyzerError::format(NAME_ID3, "ID3v2 tag is truncated"));
            }
            found.tag = true;
            tag_end = tag_sz as u64;
            self.parse_id3v2(result, &buf[..tag_sz], &mut album_uri, &mut found);
            buf[tag_sz..].to_vec()
        } else {
            first
        };

        let i = count_nul(&after, MAX_PADDING);
        if let Some((bitrate, samplerate, mode)) = mpeg_frame_header(&after[i..]) {
            let f = &self.fields;
            result.add_value(&f.type_, CLASS_AUDIO);
            result.add_value(&f.bitrate, BITRATES[bitrate]);
            result.add_value(&f.samplerate, SAMPLERATES[samplerate]);
            result.add_value(&f.codec, "MP3");
            let channels: i32 = match mode {
                3 => 1,
                _ => 2,
            };
            result.add_value(&f.channels, channels);
        }

        if let Some(size) = input.size() {
            if size >= ID3V1_SZ as u64 + tag_end {
                let at = size - ID3V1_SZ as u64;
                let position = input.position();
                // the first reads may have gone past the ID3v1 tag already
                let reached: bool = match position <= at {
                    true => input.skip(at - position) == at - position,
                    false => input.reset(at) == at,
                };
                if reached {
                    let buf = read_owned(input, ID3V1_SZ, ID3V1_SZ)?;
                    if buf.len() == ID3V1_SZ && buf.starts_with(b"TAG") {
                        defo!("ID3v1 tag");
                        found.tag = true;
                        self.parse_id3v1(result, &buf, &mut album_uri, &found);
                    }
                }
            }
        }

        if let Some(album) = album_uri {
            result.add_value(&self.fields.album, album.as_str());
            result.add_triplet(&album, PREDICATE_TYPE, CLASS_MUSICALBUM);
        }
        if found.tag {
            result.add_value(&self.fields.type_, CLASS_MUSICPIECE);
        }
        defx!();

        Ok(())
    }

    fn handles_sub_streams(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
pub struct Id3UnitFactory {}

impl Id3UnitFactory {
    pub fn new() -> Id3UnitFactory {
        Id3UnitFactory {}
    }
}

impl UnitFactory for Id3UnitFactory {
    fn name(&self) -> &str {
        NAME_ID3
    }

    fn register_fields(&self, register: &FieldRegister) {
        for key in FIELDS.iter() {
            register.register_field(key);
        }
    }
}

impl TerminalUnitFactory for Id3UnitFactory {
    fn new_instance(&self, register: &FieldRegister) -> Box<dyn TerminalUnit> {
        let r = |key: &str| register.register_field(key);
        Box::new(Id3Unit {
            fields: Id3Fields {
                created: r(FIELD_CONTENTCREATED),
                subject: r(FIELD_SUBJECT),
                title: r(FIELD_TITLE),
                description: r(FIELD_DESCRIPTION),
                comment: r(FIELD_COMMENT),
                album: r(FIELD_MUSICALBUM),
                genre: r(FIELD_GENRE),
                composer: r(FIELD_COMPOSER),
                performer: r(FIELD_PERFORMER),
                lyricist: r(FIELD_LYRICIST),
                publisher: r(FIELD_PUBLISHER),
                language: r(FIELD_LANGUAGE),
                copyright: r(FIELD_COPYRIGHT),
                track_number: r(FIELD_TRACKNUMBER),
                disc_number: r(FIELD_DISCNUMBER),
                duration: r(FIELD_DURATION),
                bitrate: r(FIELD_AVERAGEBITRATE),
                samplerate: r(FIELD_SAMPLERATE),
                codec: r(FIELD_CODEC),
                channels: r(FIELD_CHANNELS),
                type_: register.type_field.clone(),
            },
        })
    }
}
