use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use smallvec::SmallVec;
use tagtext::Style;
use unicode_segmentation::UnicodeSegmentation;

use crate::canvas::{FontHandle, TextMeasurer};
use crate::error::TextConfigError;

/// Built-in fallback families covering Latin, CJK, and emoji on common platforms.
pub const DEFAULT_FALLBACK_FONTS: &[&str] = &[
    "Arial",
    "Tahoma",
    "Helvetica Neue",
    "Segoe UI",
    "PingFang SC",
    "Hiragino Sans GB",
    "Microsoft YaHei",
    "Source Han Sans SC",
    "Noto Sans SC",
    "Noto Sans CJK SC",
    "WenQuanYi Micro Hei",
    "Apple Color Emoji",
    "Noto Color Emoji",
    "Segoe UI Emoji",
    "Segoe UI Symbol",
];

/// Tail of [`DEFAULT_FALLBACK_FONTS`]; the built-in list's last resort.
pub const DEFAULT_LAST_RESORT_FONT: &str = DEFAULT_FALLBACK_FONTS[DEFAULT_FALLBACK_FONTS.len() - 1];

static GLOBAL_FALLBACK: OnceLock<FontFallbackList> = OnceLock::new();

/// Ordered, non-empty list of fallback family names.
///
/// The last family is the unconditional last resort.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontFallbackList {
    families: Arc<[Arc<str>]>,
    last_resort: Arc<str>,
}

impl FontFallbackList {
    /// Build a list; blank entries and case-insensitive duplicates are dropped.
    pub fn new<I, S>(families: I) -> Result<Self, TextConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<Arc<str>> = Vec::with_capacity(16);
        for family in families {
            let family = family.as_ref().trim();
            if family.is_empty() || out.iter().any(|f| same_family(f, family)) {
                continue;
            }
            out.push(Arc::from(family));
        }
        let last_resort = out
            .last()
            .cloned()
            .ok_or(TextConfigError::EmptyFallbackList)?;
        Ok(Self {
            families: out.into(),
            last_resort,
        })
    }

    /// The built-in [`DEFAULT_FALLBACK_FONTS`] list.
    pub fn builtin() -> Self {
        let families: Arc<[Arc<str>]> = DEFAULT_FALLBACK_FONTS
            .iter()
            .map(|family| Arc::from(*family))
            .collect();
        let last_resort = Arc::from(DEFAULT_LAST_RESORT_FONT);
        Self {
            families,
            last_resort,
        }
    }

    /// Install the process-wide list. Only the first install succeeds.
    pub fn install_global(list: FontFallbackList) -> Result<(), TextConfigError> {
        GLOBAL_FALLBACK
            .set(list)
            .map_err(|_| TextConfigError::FallbackAlreadyInstalled)
    }

    /// Process-wide list: the installed one, else the built-in default.
    pub fn global() -> Self {
        Self::installed().unwrap_or_else(Self::builtin)
    }

    /// The list passed to [`FontFallbackList::install_global`], if any.
    pub fn installed() -> Option<Self> {
        GLOBAL_FALLBACK.get().cloned()
    }

    pub fn families(&self) -> &[Arc<str>] {
        &self.families
    }

    pub fn last_resort(&self) -> &Arc<str> {
        &self.last_resort
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

impl Default for FontFallbackList {
    fn default() -> Self {
        Self::global()
    }
}

fn same_family(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Append-only glyph coverage cache keyed by (font, cluster).
///
/// Cheap to clone; clones share entries. Entries are never invalidated, so
/// concurrent render calls may share one cache.
#[derive(Clone, Debug, Default)]
pub struct GlyphCoverageCache {
    entries: Arc<RwLock<HashMap<FontHandle, HashMap<Box<str>, bool>>>>,
}

impl GlyphCoverageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached coverage answer, computing and storing it on a miss.
    pub fn get_or_insert_with<F>(&self, font: &FontHandle, cluster: &str, query: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = entries.get(font).and_then(|clusters| clusters.get(cluster)) {
                return *hit;
            }
        }
        let covered = query();
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(font.clone())
            .or_default()
            .entry(cluster.into())
            .or_insert(covered);
        covered
    }

    /// Number of cached (font, cluster) answers.
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Font assignment for a byte range of a run's text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontSpan {
    /// Byte range into the resolved text.
    pub range: Range<usize>,
    pub font: FontHandle,
    /// Whether some cluster had no covering candidate and fell through to
    /// the last-resort family.
    pub last_resort: bool,
}

/// Per-cluster font fallback resolution.
#[derive(Clone, Debug, Default)]
pub struct FontResolver {
    fallback: FontFallbackList,
    coverage: GlyphCoverageCache,
}

impl FontResolver {
    pub fn new(fallback: FontFallbackList) -> Self {
        Self {
            fallback,
            coverage: GlyphCoverageCache::new(),
        }
    }

    /// Share an existing coverage cache (e.g. across engines).
    pub fn with_coverage_cache(mut self, coverage: GlyphCoverageCache) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn fallback(&self) -> &FontFallbackList {
        &self.fallback
    }

    pub fn coverage_cache(&self) -> &GlyphCoverageCache {
        &self.coverage
    }

    /// `[requested] + fallback list`, without duplicates, as font handles.
    pub fn candidates(&self, requested: Option<&str>, style: &Style) -> SmallVec<[FontHandle; 16]> {
        let mut out: SmallVec<[FontHandle; 16]> = SmallVec::new();
        let requested = requested
            .map(str::trim)
            .filter(|family| !family.is_empty())
            .map(Arc::<str>::from);
        for family in requested.iter().chain(self.fallback.families()) {
            if out.iter().any(|f| same_family(&f.family, family)) {
                continue;
            }
            out.push(FontHandle::new(Arc::clone(family), style.bold, style.italic));
        }
        out
    }

    /// First candidate for a style; used for metrics of text-less lines.
    pub fn primary_font(&self, style: &Style) -> FontHandle {
        let family = style
            .font_family
            .as_ref()
            .filter(|family| !family.trim().is_empty())
            .cloned()
            .or_else(|| self.fallback.families().first().cloned())
            .unwrap_or_else(|| Arc::clone(self.fallback.last_resort()));
        FontHandle::new(family, style.bold, style.italic)
    }

    /// Split `text` into spans, each set in the first candidate able to
    /// render every cluster of the span.
    ///
    /// Clusters no candidate covers use the last candidate; this never fails.
    pub fn resolve<M>(
        &self,
        text: &str,
        requested: Option<&str>,
        style: &Style,
        measurer: &M,
    ) -> Vec<FontSpan>
    where
        M: TextMeasurer + ?Sized,
    {
        let candidates = self.candidates(requested, style);
        let last = candidates.len().saturating_sub(1);
        let mut spans: Vec<FontSpan> = Vec::with_capacity(2);
        let mut span_candidate = usize::MAX;
        let mut uncovered = 0usize;

        for (start, cluster) in text.grapheme_indices(true) {
            let end = start + cluster.len();
            let found = candidates
                .iter()
                .position(|font| self.covers(font, cluster, measurer));
            let (idx, last_resort) = match found {
                Some(idx) => (idx, false),
                None => {
                    uncovered += 1;
                    (last, true)
                }
            };

            match spans.last_mut() {
                Some(span) if span_candidate == idx => {
                    span.range.end = end;
                    span.last_resort |= last_resort;
                }
                _ => {
                    let Some(font) = candidates.get(idx) else {
                        continue;
                    };
                    spans.push(FontSpan {
                        range: start..end,
                        font: font.clone(),
                        last_resort,
                    });
                    span_candidate = idx;
                }
            }
        }

        if uncovered > 0 {
            log::warn!(
                "{} cluster(s) not covered by any of {} candidate font(s); using '{}'",
                uncovered,
                candidates.len(),
                candidates
                    .last()
                    .map(|f| f.family.as_ref())
                    .unwrap_or_default()
            );
        }
        spans
    }

    fn covers<M>(&self, font: &FontHandle, cluster: &str, measurer: &M) -> bool
    where
        M: TextMeasurer + ?Sized,
    {
        self.coverage
            .get_or_insert_with(font, cluster, || measurer.has_glyph(font, cluster))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::FontMetrics;
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;

    /// "latin" covers ASCII, "cjk" covers CJK ideographs, "emoji" covers
    /// anything outside the BMP.
    struct CoverageStub {
        queries: Cell<usize>,
    }

    impl CoverageStub {
        fn new() -> Self {
            Self {
                queries: Cell::new(0),
            }
        }
    }

    impl TextMeasurer for CoverageStub {
        fn measure_advance(&self, _font: &FontHandle, size_px: f32, text: &str) -> f32 {
            text.chars().count() as f32 * size_px * 0.5
        }

        fn font_metrics(&self, _font: &FontHandle, size_px: f32) -> FontMetrics {
            FontMetrics {
                ascent: size_px * 0.8,
                descent: size_px * 0.2,
            }
        }

        fn has_glyph(&self, font: &FontHandle, cluster: &str) -> bool {
            self.queries.set(self.queries.get() + 1);
            stub_covers(font, cluster)
        }
    }

    fn stub_covers(font: &FontHandle, cluster: &str) -> bool {
        cluster.chars().all(|ch| match font.family.as_ref() {
            "latin" => ch.is_ascii(),
            "cjk" => ('\u{4E00}'..='\u{9FFF}').contains(&ch),
            "emoji" => ch as u32 > 0xFFFF || ch == '\u{200D}' || ch == '\u{FE0F}',
            _ => false,
        })
    }

    /// Thread-safe twin of `CoverageStub` that records every distinct
    /// (family, cluster) pair it was asked about.
    #[derive(Default)]
    struct SharedStub {
        queries: AtomicUsize,
        asked: Mutex<HashSet<(String, String)>>,
    }

    impl TextMeasurer for SharedStub {
        fn measure_advance(&self, _font: &FontHandle, size_px: f32, text: &str) -> f32 {
            text.chars().count() as f32 * size_px * 0.5
        }

        fn font_metrics(&self, _font: &FontHandle, size_px: f32) -> FontMetrics {
            FontMetrics {
                ascent: size_px * 0.8,
                descent: size_px * 0.2,
            }
        }

        fn has_glyph(&self, font: &FontHandle, cluster: &str) -> bool {
            self.queries.fetch_add(1, Ordering::Relaxed);
            self.asked
                .lock()
                .expect("lock")
                .insert((font.family.to_string(), cluster.to_string()));
            stub_covers(font, cluster)
        }
    }

    fn resolver(families: &[&str]) -> FontResolver {
        FontResolver::new(FontFallbackList::new(families).expect("non-empty list"))
    }

    fn families(spans: &[FontSpan], text: &str) -> Vec<(String, String)> {
        spans
            .iter()
            .map(|s| (text[s.range.clone()].to_string(), s.font.family.to_string()))
            .collect()
    }

    #[test]
    fn empty_fallback_list_is_rejected() {
        let empty: [&str; 0] = [];
        assert_eq!(
            FontFallbackList::new(empty),
            Err(TextConfigError::EmptyFallbackList)
        );
        assert_eq!(
            FontFallbackList::new(["  ", ""]),
            Err(TextConfigError::EmptyFallbackList)
        );
    }

    #[test]
    fn fallback_list_drops_duplicates() {
        let list = FontFallbackList::new(["A", "b", "a", "B ", "c"]).expect("list");
        let names: Vec<&str> = list.families().iter().map(|f| f.as_ref()).collect();
        assert_eq!(names, vec!["A", "b", "c"]);
        assert_eq!(list.last_resort().as_ref(), "c");
    }

    #[test]
    fn builtin_last_resort_matches_list_tail() {
        let list = FontFallbackList::builtin();
        assert_eq!(list.families().last(), Some(list.last_resort()));
    }

    #[test]
    fn builtin_list_is_the_default_font_table() {
        let list = FontFallbackList::builtin();
        assert_eq!(Some(&DEFAULT_LAST_RESORT_FONT), DEFAULT_FALLBACK_FONTS.last());
        assert_eq!(list.last_resort().as_ref(), DEFAULT_LAST_RESORT_FONT);
        assert_eq!(
            FontFallbackList::new(DEFAULT_FALLBACK_FONTS).expect("list"),
            list
        );
    }

    #[test]
    fn splits_runs_where_fallback_changes() {
        let resolver = resolver(&["latin", "cjk", "emoji"]);
        let measurer = CoverageStub::new();
        let text = "Hi 你好!";
        let spans = resolver.resolve(text, None, &Style::default(), &measurer);
        assert_eq!(
            families(&spans, text),
            vec![
                ("Hi ".to_string(), "latin".to_string()),
                ("你好".to_string(), "cjk".to_string()),
                ("!".to_string(), "latin".to_string()),
            ]
        );
        assert!(spans.iter().all(|s| !s.last_resort));
    }

    #[test]
    fn requested_family_is_tried_first() {
        let resolver = resolver(&["latin", "emoji"]);
        let measurer = CoverageStub::new();
        let spans = resolver.resolve("ab", Some("emoji"), &Style::default(), &measurer);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].font.family.as_ref(), "latin");

        let spans = resolver.resolve("ab", Some("latin"), &Style::default(), &measurer);
        assert_eq!(spans[0].font.family.as_ref(), "latin");
    }

    #[test]
    fn zwj_emoji_sequence_stays_atomic() {
        let resolver = resolver(&["latin", "emoji"]);
        let measurer = CoverageStub::new();
        let text = "a\u{1F469}\u{200D}\u{1F4BB}b";
        let spans = resolver.resolve(text, None, &Style::default(), &measurer);
        assert_eq!(
            families(&spans, text),
            vec![
                ("a".to_string(), "latin".to_string()),
                ("\u{1F469}\u{200D}\u{1F4BB}".to_string(), "emoji".to_string()),
                ("b".to_string(), "latin".to_string()),
            ]
        );
    }

    #[test]
    fn uncovered_cluster_uses_last_candidate() {
        let resolver = resolver(&["latin", "cjk"]);
        let measurer = CoverageStub::new();
        let text = "a\u{0416}";
        let spans = resolver.resolve(text, None, &Style::default(), &measurer);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].font.family.as_ref(), "cjk");
        assert!(spans[1].last_resort);
        assert!(!spans[0].last_resort);
    }

    #[test]
    fn coverage_queries_are_cached() {
        let resolver = resolver(&["latin"]);
        let measurer = CoverageStub::new();
        resolver.resolve("aaaa", None, &Style::default(), &measurer);
        assert_eq!(measurer.queries.get(), 1);
        assert_eq!(resolver.coverage_cache().len(), 1);
        resolver.resolve("a", None, &Style::default(), &measurer);
        assert_eq!(measurer.queries.get(), 1);
    }

    #[test]
    fn style_bits_flow_into_handles() {
        let resolver = resolver(&["latin"]);
        let style = Style {
            bold: true,
            italic: true,
            ..Style::default()
        };
        let candidates = resolver.candidates(None, &style);
        assert!(candidates[0].bold && candidates[0].italic);
    }

    #[test]
    fn shared_cache_across_threads_matches_serial_resolution() {
        const TEXTS: &[&str] = &[
            "Hi \u{4F60}\u{597D}!",
            "a\u{1F469}\u{200D}\u{1F4BB}b",
            "abc \u{4E2D}\u{6587} xyz",
            "\u{0416}x\u{0416}",
            "\u{1F600}\u{1F600} ok",
        ];
        let list = FontFallbackList::new(["latin", "cjk", "emoji"]).expect("list");
        let style = Style::default();

        let serial = FontResolver::new(list.clone());
        let serial_measurer = SharedStub::default();
        let expected: Vec<Vec<FontSpan>> = TEXTS
            .iter()
            .map(|text| serial.resolve(text, None, &style, &serial_measurer))
            .collect();

        let cache = GlyphCoverageCache::new();
        let measurer = SharedStub::default();
        let results: Vec<Vec<Vec<FontSpan>>> = thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|worker| {
                    let resolver =
                        FontResolver::new(list.clone()).with_coverage_cache(cache.clone());
                    let (measurer, style) = (&measurer, &style);
                    scope.spawn(move || {
                        let mut out = vec![Vec::new(); TEXTS.len()];
                        for step in 0..TEXTS.len() * 3 {
                            let idx = (worker + step) % TEXTS.len();
                            out[idx] = resolver.resolve(TEXTS[idx], None, style, measurer);
                        }
                        out
                    })
                })
                .collect();
            workers
                .into_iter()
                .map(|worker| worker.join().expect("worker"))
                .collect()
        });

        for spans in &results {
            assert_eq!(spans, &expected);
        }
        let distinct = measurer.asked.lock().expect("lock").len();
        assert_eq!(cache.len(), distinct);
        assert_eq!(cache.len(), serial.coverage_cache().len());
        assert_eq!(
            distinct,
            serial_measurer.queries.load(Ordering::Relaxed),
            "serial resolution asks each pair once"
        );
    }
}
