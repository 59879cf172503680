use crate::config::{
    DisplayName, DESCRIPTION_HEADER, DESCRIPTION_HEADER_SIZE,
    SEARCH_EXTENSION_HEADER,
};
use crate::description;
use crate::target::SearchTarget;
use core::fmt::Write;

const LINE_END: &[u8] = b"\r\n";
const SEARCH_PREFIX: &[u8] = b"M-SEARCH";
const RESPONSE_PREFIX: &[u8] = b"HTTP/1.1";

pub(crate) const fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn trim_blanks(mut s: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = s {
        if !is_blank(*first) {
            break;
        }
        s = rest;
    }
    while let [rest @ .., last] = s {
        if !is_blank(*last) {
            break;
        }
        s = rest;
    }
    s
}

/// Longest line length, stopping at the first empty terminated line
fn longest_line(buf: &[u8]) -> usize {
    let mut longest = 0;
    let mut rest = buf;
    loop {
        match find(rest, LINE_END) {
            Some(0) => return longest,
            Some(n) => {
                longest = longest.max(n);
                rest = &rest[n + LINE_END.len()..];
            }
            None => return longest.max(rest.len()),
        }
    }
}

/// Copy as much of `src` as fits, leaving room for a terminating NUL
///
/// Returns the number of content bytes copied. An empty `out` receives
/// nothing, not even the terminator.
pub fn copy_truncated(src: &[u8], out: &mut [u8]) -> usize {
    let Some(room) = out.len().checked_sub(1) else {
        return 0;
    };
    let n = src.len().min(room);
    out[..n].copy_from_slice(&src[..n]);
    out[n] = 0;
    n
}

/// The longest prefix of `s` no more than `max` bytes long
///
/// Never splits a UTF-8 sequence.
pub fn truncate_str(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Position of the start of a line within a [`Message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(usize);

/// A read-only view of one received protocol message
///
/// The message is a sequence of CRLF-terminated lines, ended by an empty
/// line. Nothing is copied at construction: lines and header values are
/// returned as slices of the original buffer, or copied on request into
/// caller-provided storage.
#[derive(Debug, Clone, Copy)]
pub struct Message<'a> {
    buf: &'a [u8],
    max_line_length: usize,
}

impl<'a> Message<'a> {
    /// Wrap a received datagram
    ///
    /// Leading blanks are dropped, as is anything from the first NUL
    /// onwards. Never fails: garbage input yields a message with no
    /// lines.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        let buf = &buf[..end];
        let start = buf
            .iter()
            .position(|&b| !is_blank(b))
            .unwrap_or(buf.len());
        let buf = &buf[start..];
        Self {
            buf,
            max_line_length: longest_line(buf),
        }
    }

    /// The message bytes, after leading blanks have been removed
    #[must_use]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }

    /// Length of the longest line in the message
    ///
    /// Scanning stops at the blank line ending the headers; an
    /// unterminated final line counts too.
    #[must_use]
    pub const fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// A cursor at the first line
    #[must_use]
    pub const fn start(&self) -> Cursor {
        Cursor(0)
    }

    fn line_at(&self, cursor: Cursor) -> Option<(&'a [u8], Cursor)> {
        let rest = self.buf.get(cursor.0..)?;
        let n = find(rest, LINE_END)?;
        let mut next = cursor.0 + n + LINE_END.len();
        while self.buf.get(next).is_some_and(|&b| is_blank(b)) {
            next += 1;
        }
        Some((&rest[..n], Cursor(next)))
    }

    /// Whether a non-empty, terminated line starts at `cursor`
    #[must_use]
    pub fn has_next_line(&self, cursor: Cursor) -> bool {
        self.line_at(cursor).is_some_and(|(line, _)| !line.is_empty())
    }

    /// Copy the line at `cursor` into `out`
    ///
    /// The line is truncated to `out.len() - 1` bytes and NUL-terminated.
    /// Returns the number of bytes copied and a cursor at the following
    /// line (with its leading blanks skipped), or `None` if there is no
    /// line terminator after `cursor`.
    pub fn next_line(
        &self,
        cursor: Cursor,
        out: &mut [u8],
    ) -> Option<(usize, Cursor)> {
        let (line, next) = self.line_at(cursor)?;
        Some((copy_truncated(line, out), next))
    }

    /// Iterate over the header lines, stopping at the first empty line
    #[must_use]
    pub const fn lines(&self) -> Lines<'a> {
        Lines {
            message: *self,
            cursor: Cursor(0),
        }
    }

    /// The raw value of header `name`, with surrounding blanks removed
    ///
    /// The name must start the line, in exactly this case, and be
    /// followed by a blank or a colon, so looking up `ST` does not find
    /// `ST.VENDOR.COM: ...`. If several lines match, the last one wins.
    #[must_use]
    pub fn header_bytes(&self, name: &str) -> Option<&'a [u8]> {
        self.lines()
            .filter_map(|line| header_in_line(line, name.as_bytes()))
            .last()
    }

    /// The value of header `name`, if present and valid UTF-8
    ///
    /// Matching is as for [`Message::header_bytes`].
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.header_bytes(name)
            .and_then(|value| core::str::from_utf8(value).ok())
    }

    /// Copy the value of header `name` into `out`
    ///
    /// `out.len()` counts the terminator slot: longer values are silently
    /// truncated to `out.len() - 1` bytes. Returns the number of bytes
    /// copied, or `None` if the header is absent.
    pub fn header_value(&self, name: &str, out: &mut [u8]) -> Option<usize> {
        self.header_bytes(name)
            .map(|value| copy_truncated(value, out))
    }

    /// The value of header `name`, truncated to at most `N` bytes
    #[must_use]
    pub fn header_string<const N: usize>(
        &self,
        name: &str,
    ) -> Option<heapless::String<N>> {
        self.header(name).map(|value| {
            let mut s = heapless::String::new();
            let _ = s.push_str(truncate_str(value, N));
            s
        })
    }

    /// The raw value of the description header, if present
    #[must_use]
    pub fn description(&self) -> Option<&'a str> {
        self.header(DESCRIPTION_HEADER)
            .map(|value| truncate_str(value, DESCRIPTION_HEADER_SIZE - 1))
    }

    /// The display name carried in the description header
    ///
    /// `None` if the header is missing, or has no `:name:` field, or
    /// nothing terminates that field.
    #[must_use]
    pub fn display_name(&self) -> Option<DisplayName> {
        let name = description::display_name(self.description()?)?;
        let mut s = DisplayName::new();
        let _ = s.push_str(truncate_str(name, s.capacity()));
        Some(s)
    }

    /// Whether this is a search request (`M-SEARCH ...`)
    #[must_use]
    pub fn is_search_request(&self) -> bool {
        self.buf.starts_with(SEARCH_PREFIX)
    }

    /// Whether this is a search response (`HTTP/1.1 ...`)
    #[must_use]
    pub fn is_search_response(&self) -> bool {
        self.buf.starts_with(RESPONSE_PREFIX)
    }
}

fn header_in_line<'a>(line: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    let candidate = line.get(..name.len())?;
    if candidate != name {
        return None;
    }
    match line.get(name.len()) {
        Some(&b) if b == b':' || is_blank(b) => {}
        _ => return None,
    }
    let colon = name.len()
        + line[name.len()..].iter().position(|&b| b == b':')?;
    Some(trim_blanks(&line[colon + 1..]))
}

/// Iterator over the header lines of a [`Message`]
///
/// See [`Message::lines`].
#[derive(Debug, Clone)]
pub struct Lines<'a> {
    message: Message<'a>,
    cursor: Cursor,
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let (line, next) = self.message.line_at(self.cursor)?;
        if line.is_empty() {
            return None;
        }
        self.cursor = next;
        Some(line)
    }
}

/// A `core::fmt::Write` sink over a fixed buffer, which truncates
///
/// One byte is always held back for a NUL terminator, which
/// [`MessageCursor::finish`] writes. Once anything has been truncated,
/// later writes are refused, so `write!` stops early.
pub(crate) struct MessageCursor<'a> {
    buf: &'a mut [u8],
    offset: usize,
    full: bool,
}

impl<'a> MessageCursor<'a> {
    pub fn new(buf: &'a mut [u8]) -> MessageCursor<'a> {
        MessageCursor {
            buf,
            offset: 0,
            full: false,
        }
    }

    fn room(&self) -> usize {
        self.buf.len().saturating_sub(1).saturating_sub(self.offset)
    }

    /// Terminate the content and return its length
    pub fn finish(self) -> usize {
        if let Some(b) = self.buf.get_mut(self.offset) {
            *b = 0;
        }
        self.offset
    }
}

impl core::fmt::Write for MessageCursor<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        if self.full {
            return Err(core::fmt::Error);
        }
        let fits = truncate_str(s, self.room());
        let n = fits.len();
        self.buf[self.offset..self.offset + n]
            .copy_from_slice(fits.as_bytes());
        self.offset += n;
        if n < s.len() {
            self.full = true;
            return Err(core::fmt::Error);
        }
        Ok(())
    }
}

/// Build an outbound search request into `buf`
///
/// Root-device searches carry `ssdp:all` in the extension header only
/// when `respond_all` is set; uuid and type searches always carry it.
/// Returns the length written, excluding the NUL terminator.
pub fn build_search(
    buf: &mut [u8],
    search_target: &str,
    respond_all: bool,
) -> usize {
    let extension = match SearchTarget::parse(search_target) {
        Some(SearchTarget::RootDevice) if !respond_all => "",
        _ => "ssdp:all",
    };
    let mut cursor = MessageCursor::new(buf);
    let _ = write!(
        cursor,
        "M-SEARCH * HTTP/1.1\r
HOST: 239.255.255.250:1900\r
MAN: ssdp:discover\r
ST: {search_target}\r
{SEARCH_EXTENSION_HEADER}: {extension}\r
USER-AGENT: none/0 UPnP/1.1 {}/{}\r
\r\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    );
    cursor.finish()
}
