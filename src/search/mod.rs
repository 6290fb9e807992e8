//! Search and replace over the buffer
//!
//! Two tiers: plain literals go through a memmem finder fed by the piece
//! chunks with a small carry window, regex patterns run the in-crate engine
//! over large chunks with a fixed overlap so matches straddling a chunk
//! boundary are still seen. Compiled regexes are kept in a tiny LRU keyed by
//! pattern text.

use std::num::NonZeroUsize;
use std::ops::Range;
use std::rc::Rc;

use lru::LruCache;
use memchr::memmem;

use crate::buffer::Buffer;
use crate::constants::limits::{REGEX_CACHE_CAP, SEARCH_CHUNK_OVERLAP, SEARCH_CHUNK_SIZE};
use crate::error::Result;
use crate::regex::Regex;

/// A pattern is treated as a regex when it contains any metacharacter
pub fn is_regex_pattern(pattern: &str) -> bool {
    pattern
        .bytes()
        .any(|b| matches!(b, b'.' | b'*' | b'+' | b'?' | b'[' | b']' | b'^' | b'$' | b'\\'))
}

/// Search service with the compiled-regex cache
pub struct SearchService {
    cache: LruCache<String, Rc<Regex>>,
}

impl SearchService {
    pub fn new() -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(REGEX_CACHE_CAP).unwrap()),
        }
    }

    fn compiled(&mut self, pattern: &str) -> Result<Rc<Regex>> {
        if let Some(re) = self.cache.get(pattern) {
            return Ok(re.clone());
        }
        let re = Rc::new(Regex::compile(pattern)?);
        self.cache.put(pattern.to_owned(), re.clone());
        Ok(re)
    }

    #[cfg(test)]
    pub(crate) fn cached_patterns(&self) -> usize {
        self.cache.len()
    }

    /// Forward search from `from`, no wrap-around
    pub fn search_forward(
        &mut self,
        buf: &Buffer,
        pattern: &str,
        from: usize,
    ) -> Result<Option<Range<usize>>> {
        if pattern.is_empty() || from > buf.len() {
            return Ok(None);
        }
        if is_regex_pattern(pattern) {
            let re = self.compiled(pattern)?;
            Ok(regex_forward(buf, &re, from))
        } else {
            Ok(literal_forward(buf, pattern.as_bytes(), from))
        }
    }

    /// Backward search: rightmost match starting strictly before `before`
    pub fn search_backward(
        &mut self,
        buf: &Buffer,
        pattern: &str,
        before: usize,
    ) -> Result<Option<Range<usize>>> {
        if pattern.is_empty() {
            return Ok(None);
        }
        let before = before.min(buf.len());
        if is_regex_pattern(pattern) {
            let re = self.compiled(pattern)?;
            let bytes = buf.slice_to_vec(0..buf.len());
            let text = String::from_utf8_lossy(&bytes);
            Ok(re.rfind(&text, before).map(|(s, e)| s..e))
        } else {
            let bytes = buf.slice_to_vec(0..before);
            Ok(memmem::rfind(&bytes, pattern.as_bytes()).map(|s| s..s + pattern.len()))
        }
    }

    /// Forward search with explicit wrap-around to `[0, from)`.
    /// `skip_current` first advances by one codepoint so a zero-width or
    /// already-found match cannot pin the search in place.
    pub fn search_forward_wrap(
        &mut self,
        buf: &Buffer,
        pattern: &str,
        from: usize,
        skip_current: bool,
    ) -> Result<Option<Range<usize>>> {
        let start = if skip_current && from < buf.len() {
            from + buf.decode_codepoint_at(from).1.max(1)
        } else {
            from
        };
        if let Some(m) = self.search_forward(buf, pattern, start)? {
            return Ok(Some(m));
        }
        match self.search_forward(buf, pattern, 0)? {
            Some(m) if m.start < from => Ok(Some(m)),
            _ => Ok(None),
        }
    }

    /// Backward search wrapping to the end of the buffer
    pub fn search_backward_wrap(
        &mut self,
        buf: &Buffer,
        pattern: &str,
        before: usize,
    ) -> Result<Option<Range<usize>>> {
        if let Some(m) = self.search_backward(buf, pattern, before)? {
            return Ok(Some(m));
        }
        match self.search_backward(buf, pattern, buf.len())? {
            Some(m) if m.start >= before => Ok(Some(m)),
            _ => Ok(None),
        }
    }
}

impl Default for SearchService {
    fn default() -> Self {
        Self::new()
    }
}

/// memmem over the piece chunks with a carry of `pattern.len() - 1` bytes so
/// matches spanning piece boundaries are found without materialising the
/// buffer
fn literal_forward(buf: &Buffer, pattern: &[u8], from: usize) -> Option<Range<usize>> {
    let finder = memmem::Finder::new(pattern);
    let mut window: Vec<u8> = Vec::new();
    let mut window_start = from;
    for chunk in buf.chunks(from..buf.len()) {
        let searched = window.len();
        window.extend_from_slice(chunk);
        // Rescan includes the carried tail of the previous window
        let scan_from = searched.saturating_sub(pattern.len() - 1);
        if let Some(off) = finder.find(&window[scan_from..]) {
            let start = window_start + scan_from + off;
            return Some(start..start + pattern.len());
        }
        if window.len() >= pattern.len() {
            let keep = pattern.len() - 1;
            let drop = window.len() - keep;
            window.copy_within(drop.., 0);
            window.truncate(keep);
            window_start += drop;
        }
    }
    None
}

/// Chunked regex scan with a fixed overlap between chunks
fn regex_forward(buf: &Buffer, re: &Regex, from: usize) -> Option<Range<usize>> {
    let len = buf.len();
    let mut chunk_start = from;
    loop {
        let mut end = (chunk_start + SEARCH_CHUNK_SIZE).min(len);
        if end < len {
            end = buf.find_utf8_char_start(end);
        }
        let bytes = buf.slice_to_vec(chunk_start..end);
        let text = String::from_utf8_lossy(&bytes);
        if let Some((s, e)) = re.find(&text, 0) {
            // A match starting inside the overlap region of a non-final
            // chunk is re-found by the next chunk, which can also see how
            // far it really extends
            let overlap_floor = text.len().saturating_sub(SEARCH_CHUNK_OVERLAP);
            if end == len || s < overlap_floor {
                return Some(chunk_start + s..chunk_start + e);
            }
        }
        if end == len {
            return None;
        }
        let next = end.saturating_sub(SEARCH_CHUNK_OVERLAP).max(chunk_start + 1);
        chunk_start = buf.find_utf8_char_start(next);
    }
}

/// Incremental-search state. The pattern is rebuilt per keystroke and every
/// rebuild searches from `start_pos`, not from the cursor, so deleting
/// pattern characters walks back to earlier matches.
#[derive(Debug, Clone)]
pub struct IncrementalSearch {
    pub pattern: String,
    pub forward: bool,
    /// Cursor position when the search began
    pub start_pos: usize,
    pub current: Option<Range<usize>>,
    pub wrapped: bool,
    pub failed: bool,
}

impl IncrementalSearch {
    pub fn new(forward: bool, start_pos: usize) -> Self {
        Self {
            pattern: String::new(),
            forward,
            start_pos,
            current: None,
            wrapped: false,
            failed: false,
        }
    }

    /// Re-run the search from `start_pos` after a pattern edit
    pub fn update(&mut self, buf: &Buffer, svc: &mut SearchService) -> Result<()> {
        self.wrapped = false;
        if self.pattern.is_empty() {
            self.current = None;
            self.failed = false;
            return Ok(());
        }
        let found = if self.forward {
            match svc.search_forward(buf, &self.pattern, self.start_pos)? {
                Some(m) => Some(m),
                None => {
                    self.wrapped = true;
                    svc.search_forward_wrap(buf, &self.pattern, self.start_pos, false)?
                }
            }
        } else {
            match svc.search_backward(buf, &self.pattern, self.start_pos)? {
                Some(m) => Some(m),
                None => {
                    self.wrapped = true;
                    svc.search_backward_wrap(buf, &self.pattern, self.start_pos)?
                }
            }
        };
        self.failed = found.is_none();
        self.current = found;
        Ok(())
    }

    /// Repeat the search from the current match (C-s / C-r again)
    pub fn advance(&mut self, buf: &Buffer, svc: &mut SearchService) -> Result<()> {
        let Some(cur) = self.current.clone() else {
            // Nothing found yet: repeating retries, wrapping to the far end
            return self.update(buf, svc);
        };
        let found = if self.forward {
            let from = if cur.is_empty() {
                cur.end + buf.decode_codepoint_at(cur.end).1.max(1)
            } else {
                cur.end
            };
            match svc.search_forward(buf, &self.pattern, from)? {
                Some(m) => Some(m),
                None => {
                    self.wrapped = true;
                    svc.search_forward_wrap(buf, &self.pattern, 0, false)?
                }
            }
        } else {
            match svc.search_backward(buf, &self.pattern, cur.start)? {
                Some(m) => Some(m),
                None => {
                    self.wrapped = true;
                    svc.search_backward_wrap(buf, &self.pattern, buf.len())?
                }
            }
        };
        self.failed = found.is_none();
        if found.is_some() {
            self.current = found;
        }
        Ok(())
    }
}

/// Interactive query-replace driver. Walks matches in order from the start
/// position; `!` replaces everything still ahead and never touches matches
/// already answered `n`.
#[derive(Debug, Clone)]
pub struct QueryReplace {
    pub pattern: String,
    pub replacement: String,
    /// Scan position for the next match
    pub pos: usize,
    pub current: Option<Range<usize>>,
    pub replaced: usize,
}

impl QueryReplace {
    pub fn new(pattern: String, replacement: String, from: usize) -> Self {
        Self {
            pattern,
            replacement,
            pos: from,
            current: None,
            replaced: 0,
        }
    }

    /// Locate the next match at or after the scan position
    pub fn find_next(&mut self, buf: &Buffer, svc: &mut SearchService) -> Result<bool> {
        match svc.search_forward(buf, &self.pattern, self.pos)? {
            Some(m) => {
                self.current = Some(m);
                Ok(true)
            }
            None => {
                self.current = None;
                Ok(false)
            }
        }
    }

    /// Skip the current match (`n`)
    pub fn skip(&mut self, buf: &Buffer) {
        if let Some(cur) = self.current.take() {
            // Step over zero-width matches by one codepoint
            self.pos = if cur.is_empty() {
                cur.end + buf.decode_codepoint_at(cur.end).1.max(1)
            } else {
                cur.end
            };
        }
    }

    /// Note a performed replacement; scanning resumes after the new text
    pub fn advance_after_replace(&mut self, new_end: usize, was_empty: bool, buf: &Buffer) {
        self.current = None;
        self.replaced += 1;
        self.pos = if was_empty {
            new_end + buf.decode_codepoint_at(new_end).1.max(1)
        } else {
            new_end
        };
    }
}
