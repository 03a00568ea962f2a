use std::alloc::{GlobalAlloc, Layout, System};
use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tagtext::{markup, Style, StyledText};
use tagtext_embedded_graphics::{fit_text_to_image, text_to_image, EgTextMeasurer};
use tagtext_render::{
    FitOptions, FitRequest, FontFallbackList, FontResolver, LayoutConfig, LayoutEngine,
    TextOptions,
};

const WRAP_WIDTH: f32 = 480.0;

/// Live and high-water heap bytes, fed by the global allocator below.
struct HeapMeter {
    live: AtomicUsize,
    high_water: AtomicUsize,
}

impl HeapMeter {
    const fn new() -> Self {
        Self {
            live: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
        }
    }

    fn grow(&self, bytes: usize) {
        let live = self.live.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.high_water.fetch_max(live, Ordering::Relaxed);
    }

    fn shrink(&self, bytes: usize) {
        // Saturate: frees of blocks allocated before the meter started are possible.
        let _ = self
            .live
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |live| {
                Some(live.saturating_sub(bytes))
            });
    }

    /// Starts a measurement window and returns the live byte count at its start.
    fn open_window(&self) -> usize {
        let live = self.live.load(Ordering::Relaxed);
        self.high_water.store(live, Ordering::Relaxed);
        live
    }

    /// Extra bytes held at the window's high-water mark.
    fn window_peak(&self, opened_at: usize) -> usize {
        self.high_water
            .load(Ordering::Relaxed)
            .saturating_sub(opened_at)
    }
}

static HEAP: HeapMeter = HeapMeter::new();

struct MeteredSystem;

#[global_allocator]
static ALLOCATOR: MeteredSystem = MeteredSystem;

unsafe impl GlobalAlloc for MeteredSystem {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            HEAP.grow(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            HEAP.grow(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        HEAP.shrink(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let moved = unsafe { System.realloc(ptr, layout, new_size) };
        if !moved.is_null() {
            let old_size = layout.size();
            if new_size > old_size {
                HEAP.grow(new_size - old_size);
            } else {
                HEAP.shrink(old_size - new_size);
            }
        }
        moved
    }
}

/// Sorted samples for one (fixture, case) pair.
struct Samples {
    fixture: &'static str,
    case: &'static str,
    nanos: Vec<u128>,
    heap: Vec<usize>,
}

impl Samples {
    fn median<T: Copy>(sorted: &[T]) -> T {
        sorted[sorted.len() / 2]
    }

    fn csv_row(&self) -> String {
        let (Some(fastest), Some(slowest), Some(heap_max)) =
            (self.nanos.first(), self.nanos.last(), self.heap.last())
        else {
            return format!("{},{},0,,,,,", self.fixture, self.case);
        };
        format!(
            "{},{},{},{},{},{},{},{}",
            self.fixture,
            self.case,
            self.nanos.len(),
            fastest,
            Self::median(&self.nanos),
            slowest,
            Self::median(&self.heap),
            heap_max
        )
    }
}

/// Warmup and sample counts shared by every case.
#[derive(Clone, Copy)]
struct Plan {
    warmup: usize,
    rounds: usize,
}

impl Plan {
    fn sample(
        self,
        fixture: &'static str,
        case: &'static str,
        mut op: impl FnMut() -> usize,
    ) -> Samples {
        (0..self.warmup).for_each(|_| {
            black_box(op());
        });
        let (mut nanos, mut heap): (Vec<u128>, Vec<usize>) = (0..self.rounds)
            .map(|_| {
                let opened_at = HEAP.open_window();
                let started = Instant::now();
                black_box(op());
                (started.elapsed().as_nanos(), HEAP.window_peak(opened_at))
            })
            .unzip();
        nanos.sort_unstable();
        heap.sort_unstable();
        Samples {
            fixture,
            case,
            nanos,
            heap,
        }
    }
}

fn fixtures() -> Vec<(&'static str, String)> {
    let sentence = "The [b]quick[/b] brown [color=#8b4513]fox[/color] jumps over the \
                    [i]lazy[/i] [u]dog[/u]. ";
    let mixed = "[size=40][align=center]Title[/align][/size]\n\
                 [stroke=black][color=yellow]outlined[/color][/stroke] \u{03b1}\u{03b2}\u{03b3} \
                 \u{0416}\u{0443}\u{043a} [del]gone[/del] [[literal]] [broken\n";
    vec![
        ("short", "[b]Hi[/b] there".to_string()),
        ("paragraph", sentence.repeat(12)),
        ("mixed", mixed.repeat(6)),
        ("malformed", "[b][i]x[/b][/i][color=nope]y[/color][size=-1]z".repeat(40)),
    ]
}

fn main() {
    let quick = std::env::args().any(|arg| arg == "--quick");
    let plan = if quick {
        Plan { warmup: 1, rounds: 5 }
    } else {
        Plan { warmup: 3, rounds: 30 }
    };

    println!("# tagtext benchmark");
    println!(
        "# mode={} warmup={} rounds={}",
        if quick { "quick" } else { "full" },
        plan.warmup,
        plan.rounds
    );
    println!("fixture,case,rounds,min_ns,median_ns,max_ns,median_peak_heap_bytes,max_peak_heap_bytes");

    let engine = LayoutEngine::new(
        LayoutConfig::default(),
        FontResolver::new(
            FontFallbackList::new(["latin1", "greek", "cyrillic", "ascii"])
                .unwrap_or_else(|e| panic!("fallback list: {}", e)),
        ),
    );
    let measurer = EgTextMeasurer::new();
    let base = Style::with_size(24.0);

    let mut rows = Vec::new();
    for (fixture, text) in fixtures() {
        rows.push(plan.sample(fixture, "parse", || {
            markup::parse(&text).children().len()
        }));
        rows.push(plan.sample(fixture, "flatten", || {
            StyledText::from_markup(&text, &base).items().len()
        }));
        let styled = StyledText::from_markup(&text, &base);
        rows.push(plan.sample(fixture, "layout_wrap", || {
            engine
                .layout(&styled, &measurer, Some(WRAP_WIDTH))
                .lines()
                .len()
        }));
        rows.push(plan.sample(fixture, "fit_box", || {
            let request = FitRequest::new(WRAP_WIDTH, 800.0, 8.0, 96.0).with_wrap(true);
            engine
                .fit_styled(&styled, base.size_px, &measurer, &request)
                .iterations as usize
        }));
        rows.push(plan.sample(fixture, "text_to_image", || {
            let opts = TextOptions::default().with_max_width(Some(WRAP_WIDTH));
            text_to_image(&text, &opts)
                .map(|out| out.image.width() as usize)
                .unwrap_or_else(|e| panic!("text_to_image failed: {}", e))
        }));
        rows.push(plan.sample(fixture, "fit_text_to_image", || {
            let fit = FitOptions::default().with_sizes(8.0, 64.0).with_wrap(true);
            fit_text_to_image(&text, 480, 320, &TextOptions::default(), &fit)
                .map(|out| out.outcome.iterations as usize)
                .unwrap_or_else(|e| panic!("fit_text_to_image failed: {}", e))
        }));
    }

    for row in &rows {
        println!("{}", row.csv_row());
    }
}
