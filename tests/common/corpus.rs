//! Deterministic markup generators for property tests.

/// xorshift64* generator; fixed seeds keep failures reproducible.
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    pub fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n.max(1) as u64) as usize
    }

    pub fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.below(items.len())]
    }
}

const WORDS: &[&str] = &[
    "a", "Hi", "there", " ", "  ", "word", "caf\u{e9}", "\u{3b1}\u{3b2}", "\u{4e2d}\u{6587}",
    "\u{1f600}", "\u{1f468}\u{200d}\u{1f469}\u{200d}\u{1f467}", "=", "/", "x y", "\t",
];

const OPEN_TAGS: &[(&str, &str)] = &[
    ("[b]", "[/b]"),
    ("[i]", "[/i]"),
    ("[u]", "[/u]"),
    ("[del]", "[/del]"),
    ("[color=red]", "[/color]"),
    ("[color=#00ff00]", "[/color]"),
    ("[stroke=blue]", "[/stroke]"),
    ("[size=18]", "[/size]"),
    ("[size=7.5]", "[/size]"),
    ("[font=mono]", "[/font]"),
    ("[font=\"Noto Sans\"]", "[/font]"),
    ("[align=center]", "[/align]"),
    ("[align=right]", "[/align]"),
    ("[B]", "[/b]"),
];

const NOISE: &[&str] = &[
    "[", "]", "[[", "]]", "[/", "[b", "b]", "[/b]", "[foo]", "[/foo]", "[color]", "[color=nope]",
    "[size=-3]", "[size=0]", "[align=justify]", "[font=]", "[b=1]", "[i]", "[/i]", "\n", "[b\n]",
];

/// Well-formed markup and the text it must flatten to.
pub fn balanced(rng: &mut Rng, depth: usize) -> (String, String) {
    let mut markup = String::new();
    let mut text = String::new();
    let parts = 1 + rng.below(4);
    for _ in 0..parts {
        match rng.below(4) {
            0 if depth > 0 => {
                let (open, close) = OPEN_TAGS[rng.below(OPEN_TAGS.len())];
                let (inner_markup, inner_text) = balanced(rng, depth - 1);
                markup.push_str(open);
                markup.push_str(&inner_markup);
                markup.push_str(close);
                text.push_str(&inner_text);
            }
            1 => {
                markup.push('\n');
                text.push('\n');
            }
            _ => {
                let word = rng.pick(WORDS);
                markup.push_str(word);
                text.push_str(word);
            }
        }
    }
    (markup, text)
}

/// Arbitrary bracket soup mixing valid tags, broken tags, and text.
pub fn noisy(rng: &mut Rng, len: usize) -> String {
    let mut out = String::new();
    for _ in 0..len {
        if rng.below(3) == 0 {
            out.push_str(rng.pick(WORDS));
        } else {
            out.push_str(rng.pick(NOISE));
        }
    }
    out
}

/// Text with brackets that can never form a tag.
pub fn tagless(rng: &mut Rng, len: usize) -> String {
    const PIECES: &[&str] = &["[", "]", "[ b ]", "[]", "[=]", "[/ ]", "[b\n]", "word", " ", "[[x"];
    let mut out = String::new();
    for _ in 0..len {
        out.push_str(rng.pick(PIECES));
    }
    out
}
