use std::env;
use std::io::Read;
use std::process::ExitCode;

use tagtext::Align;
use tagtext_embedded_graphics::{fit_text_to_image, text_to_image};
use tagtext_render::{FitOptions, TextOptions, VAlign};

#[derive(Clone, Debug)]
struct Args {
    text: String,
    out_path: String,
    opts: TextOptions,
    fit_box: Option<(u32, u32)>,
    fit: FitOptions,
}

fn main() -> ExitCode {
    match run(env::args().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            eprintln!("{}", help_text());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    let cfg = parse_args(args)?;
    let (image, lines) = match cfg.fit_box {
        Some((width, height)) => {
            let out = fit_text_to_image(&cfg.text, width, height, &cfg.opts, &cfg.fit)
                .map_err(|e| e.to_string())?;
            if out.outcome.overflow {
                eprintln!(
                    "warning: text overflows {}x{} at --min-size {}",
                    width, height, cfg.fit.min_size
                );
            }
            println!(
                "fitted at {:.2}px after {} trial layout(s)",
                out.outcome.size_px, out.outcome.iterations
            );
            (out.image, out.outcome.layout.lines().len())
        }
        None => {
            let out = text_to_image(&cfg.text, &cfg.opts).map_err(|e| e.to_string())?;
            let lines = out.layout.lines().len();
            (out.image, lines)
        }
    };
    image
        .save_png(&cfg.out_path)
        .map_err(|e| format!("unable to write {}: {}", cfg.out_path, e))?;
    println!(
        "wrote {}x{} image with {} line(s) to {}",
        image.width(),
        image.height(),
        lines,
        cfg.out_path
    );
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<Args, String> {
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h") {
        return Err("help requested".to_string());
    }

    let mut text: Option<String> = None;
    let mut cfg = Args {
        text: String::new(),
        out_path: "target/tagtext.png".to_string(),
        opts: TextOptions::default(),
        fit_box: None,
        fit: FitOptions::default(),
    };

    let mut i = 1usize;
    while i < args.len() {
        match args[i].as_str() {
            "--options" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--options requires a value".to_string())?;
                let json = std::fs::read_to_string(v)
                    .map_err(|e| format!("unable to read --options file '{}': {}", v, e))?;
                cfg.opts = TextOptions::from_json_str(&json).map_err(|e| e.to_string())?;
                i += 2;
            }
            "--file" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--file requires a value".to_string())?;
                text = Some(
                    std::fs::read_to_string(v)
                        .map_err(|e| format!("unable to read --file '{}': {}", v, e))?,
                );
                i += 2;
            }
            "--out" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--out requires a value".to_string())?;
                cfg.out_path = v.clone();
                i += 2;
            }
            "--font" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--font requires a value".to_string())?;
                cfg.opts.font_families = v.split(',').map(|s| s.trim().to_string()).collect();
                i += 2;
            }
            "--size" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--size requires a value".to_string())?;
                cfg.opts.base_size = v
                    .parse::<f32>()
                    .map_err(|_| format!("invalid --size value '{}'", v))?;
                i += 2;
            }
            "--max-width" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--max-width requires a value".to_string())?;
                cfg.opts.max_width = Some(
                    v.parse::<f32>()
                        .map_err(|_| format!("invalid --max-width value '{}'", v))?,
                );
                i += 2;
            }
            "--align" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--align requires a value".to_string())?;
                let align =
                    Align::parse(v).ok_or_else(|| format!("invalid --align value '{}'", v))?;
                cfg.opts.align = align;
                cfg.fit.halign = align;
                i += 2;
            }
            "--valign" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--valign requires a value".to_string())?;
                cfg.fit.valign = parse_valign(v)
                    .ok_or_else(|| format!("invalid --valign value '{}'", v))?;
                i += 2;
            }
            "--padding" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--padding requires a value".to_string())?;
                let px = v
                    .parse::<f32>()
                    .map_err(|_| format!("invalid --padding value '{}'", v))?;
                cfg.opts.padding = tagtext_render::Padding::uniform(px);
                i += 2;
            }
            "--plain" => {
                cfg.opts.markup = false;
                i += 1;
            }
            "--transparent" => {
                cfg.opts.background = None;
                i += 1;
            }
            "--fit" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--fit requires a value".to_string())?;
                cfg.fit_box =
                    Some(parse_box(v).ok_or_else(|| format!("invalid --fit value '{}'", v))?);
                i += 2;
            }
            "--min-size" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--min-size requires a value".to_string())?;
                cfg.fit.min_size = v
                    .parse::<f32>()
                    .map_err(|_| format!("invalid --min-size value '{}'", v))?;
                i += 2;
            }
            "--max-size" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--max-size requires a value".to_string())?;
                cfg.fit.max_size = v
                    .parse::<f32>()
                    .map_err(|_| format!("invalid --max-size value '{}'", v))?;
                i += 2;
            }
            "--wrap" => {
                cfg.fit.allow_wrap = true;
                i += 1;
            }
            "-" => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(|e| format!("unable to read stdin: {}", e))?;
                text = Some(buf);
                i += 1;
            }
            other if other.starts_with("--") => {
                return Err(format!("unknown option '{}'", other));
            }
            other => {
                if text.is_some() {
                    return Err(format!("unexpected argument '{}'", other));
                }
                text = Some(other.to_string());
                i += 1;
            }
        }
    }

    cfg.text = text.ok_or_else(|| "missing text (pass it inline or with --file)".to_string())?;
    cfg.opts.validate().map_err(|e| e.to_string())?;
    if cfg.fit_box.is_some() {
        cfg.fit.validate().map_err(|e| e.to_string())?;
    }
    Ok(cfg)
}

fn parse_valign(value: &str) -> Option<VAlign> {
    match value.trim().to_ascii_lowercase().as_str() {
        "top" => Some(VAlign::Top),
        "center" | "middle" => Some(VAlign::Center),
        "bottom" => Some(VAlign::Bottom),
        _ => None,
    }
}

fn parse_box(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.trim().split_once(['x', 'X'])?;
    let w = w.parse::<u32>().ok()?;
    let h = h.parse::<u32>().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

fn help_text() -> &'static str {
    r#"tagtext-png - render bracket markup to a PNG

USAGE:
  cargo run -p tagtext-embedded-graphics --bin tagtext-png -- <text|-> [options]

  Pass - to read the text from stdin.

OPTIONS:
  --file <path>       read the text from a file instead
  --out <path>        output PNG path (default: target/tagtext.png)
  --options <path>    JSON text options; later flags override it
  --font <a,b,..>     fallback font families (default: latin1,greek,cyrillic,ascii)
  --size <px>         base font size (default: 30)
  --max-width <px>    wrap lines at this width
  --align <a>         left|center|right (default: left)
  --padding <px>      padding on every side (default: 10)
  --plain             draw brackets literally instead of parsing markup
  --transparent       no background fill
  --fit <WxH>         fit text into a fixed-size image
  --min-size <px>     smallest size tried by --fit (default: 12)
  --max-size <px>     largest size tried by --fit (default: 30)
  --valign <v>        top|center|bottom placement for --fit (default: center)
  --wrap              allow --fit to wrap lines

MARKUP:
  [b] [i] [u] [del] [color=red] [stroke=#000] [size=24] [font=name] [align=center]
"#
}
