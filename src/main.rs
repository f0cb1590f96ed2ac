#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::match_same_arms)]

use std::fs::File;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, bail};
use augury::DEFAULT_PAGE_LEN;
use clap::{Parser, ValueEnum};
use clap_cargo::style::CLAP_STYLING;
use env_logger::{Builder, Env};
use log::{error, info};
use ratatui::DefaultTerminal;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::widgets::ScrollbarState;
use tui_input::Input;
use tui_input::backend::crossterm::EventHandler;

use target::Target;
use ui::hexdump::HEXDUMP_WIDTH;

mod plain;
mod target;
mod ui;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum InputMode {
    Normal,
    Editing,
}

#[derive(Parser, Debug, Clone, Default)]
#[command(version, about, long_about = None, styles = CLAP_STYLING)]
struct Args {
    /// Map the raw bytes of a file at an address
    ///
    /// `ADDR:PATH`, where ADDR is decimal, `0x` hex, or arithmetic such as `(4096+32)`.
    /// Arithmetic is signed 64-bit, so addresses above 0x7fffffffffffffff must be written bare.
    /// Later regions win where they overlap.
    #[arg(short, long, value_name = "ADDR:PATH")]
    region: Vec<String>,

    /// Resolve a heap symbol to a value
    ///
    /// `NAME=VALUE`, NAME is one of `main_arena.top`, `mp_.sbrk_base`, `main_arena.fastbinsY`.
    /// VALUE follows the ADDR rules of `--region`
    #[arg(short, long, value_name = "NAME=VALUE")]
    symbol: Vec<String>,

    /// Pointer width of the inspected process
    #[arg(long)]
    #[arg(value_enum)]
    #[arg(default_value_t = PtrSize::default())]
    ptr_size: PtrSize,

    /// Byte order of the inspected process
    #[arg(long)]
    #[arg(value_enum)]
    #[arg(default_value_t = EndianArg::default())]
    endian: EndianArg,

    /// Print the chunks to stdout instead of opening the TUI
    #[arg(long)]
    plain: bool,

    /// Chunks printed between `--More--` prompts with --plain, 0 prints everything at once
    #[arg(long, default_value_t = DEFAULT_PAGE_LEN)]
    page_len: usize,

    /// Print the raw words of the selected chunk and exit
    #[arg(long)]
    dump: bool,

    /// Path to write log
    ///
    /// Set env `RUST_LOG` to change log level
    #[arg(long)]
    log_path: Option<String>,

    /// Chunk to start from: an index, or a chunk or user address in `0x` hex
    selector: Option<String>,
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum PtrSize {
    #[value(name = "32")]
    Size32,
    #[default]
    #[value(name = "64")]
    Size64,
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum EndianArg {
    #[default]
    Little,
    Big,
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
enum Mode {
    #[default]
    Heap,
    Hexdump,
    QuitConfirmation,
}

#[derive(Debug, Default, Clone)]
struct Scroll {
    scroll: usize,
    state: ScrollbarState,
}

impl Scroll {
    pub fn set(&mut self, position: usize) {
        self.scroll = position;
        self.state = self.state.position(position);
    }

    pub fn reset(&mut self) {
        self.set(0);
    }

    pub fn end(&mut self, len: usize) {
        self.set(len.saturating_sub(1));
    }

    pub fn down(&mut self, n: usize, len: usize) {
        self.set(self.scroll.saturating_add(n).min(len.saturating_sub(1)));
    }

    pub fn up(&mut self, n: usize) {
        self.set(self.scroll.saturating_sub(n));
    }
}

struct State {
    target: Target,
    /// Current mode
    mode: Mode,
    /// Previous mode (for quit confirmation)
    previous_mode: Mode,
    /// Goto prompt
    input: Input,
    input_mode: InputMode,
    /// Left side of status in TUI
    status: String,
    /// Right side of status in TUI, outcome of the last action
    result: String,
    /// Selected chunk, `heap.len()` being the top chunk
    heap_scroll: Scroll,
    /// Address and bytes of the dumped region
    hexdump: Option<(u64, Vec<u8>)>,
    hexdump_scroll: Scroll,
}

impl State {
    fn new(target: Target) -> Self {
        Self {
            target,
            mode: Mode::default(),
            previous_mode: Mode::default(),
            input: Input::default(),
            input_mode: InputMode::Normal,
            status: String::new(),
            result: String::new(),
            heap_scroll: Scroll::default(),
            hexdump: None,
            hexdump_scroll: Scroll::default(),
        }
    }

    /// Entries in the heap view, the top chunk included
    fn heap_len(&mut self) -> usize {
        self.target.heap().map_or(0, |(heap, _)| heap.len() + 1)
    }

    fn goto(&mut self, token: &str) {
        let token = if token.is_empty() { "0" } else { token };
        match self.target.heap().and_then(|(heap, _)| heap.resolve_index(token)) {
            Ok(index) => {
                self.heap_scroll.set(index);
                self.mode = Mode::Heap;
                self.result = format!("HEAP[{index}]");
            }
            Err(e) => {
                error!("goto {token}: {e}");
                self.result = e.to_string();
            }
        }
    }

    fn open_hexdump(&mut self) {
        let index = self.heap_scroll.scroll;
        let dump = self.target.heap().and_then(|(heap, image)| {
            let region = heap.dump_region(index)?;
            let len = region.len_bytes(heap.word_size) as usize;
            let bytes = image.read_bytes(region.address, len)?;
            Ok((region.address, bytes.to_vec()))
        });
        match dump {
            Ok(dump) => {
                self.hexdump = Some(dump);
                self.hexdump_scroll.reset();
                self.mode = Mode::Hexdump;
            }
            Err(e) => {
                error!("hexdump of HEAP[{index}]: {e}");
                self.result = e.to_string();
            }
        }
    }

    fn reload(&mut self) {
        match self.target.reload() {
            Ok(()) => {
                self.result = format!("reloaded, generation {}", self.target.generation());
                self.hexdump = None;
                self.mode = Mode::Heap;
                let len = self.heap_len();
                if self.heap_scroll.scroll >= len {
                    self.heap_scroll.end(len);
                }
            }
            Err(e) => {
                error!("reload: {e:?}");
                self.result = format!("{e:#}");
            }
        }
    }

    fn scroll(&mut self, code: KeyCode) {
        let (scroll, len) = match self.mode {
            Mode::Hexdump => {
                let len = self.hexdump.as_ref().map_or(0, |(_, data)| data.len());
                (&mut self.hexdump_scroll, len.div_ceil(HEXDUMP_WIDTH))
            }
            _ => {
                let len = self.heap_len();
                (&mut self.heap_scroll, len)
            }
        };
        match code {
            KeyCode::Char('g') => scroll.reset(),
            KeyCode::Char('G') => scroll.end(len),
            KeyCode::Char('j') | KeyCode::Down => scroll.down(1, len),
            KeyCode::Char('k') | KeyCode::Up => scroll.up(1),
            KeyCode::Char('J') | KeyCode::PageDown => scroll.down(50, len),
            KeyCode::Char('K') | KeyCode::PageUp => scroll.up(50),
            _ => (),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // initialize logging, to log_path if available
    init_logging(args.log_path.as_ref())?;

    if args.region.is_empty() {
        bail!("Nothing to inspect, map memory with --region ADDR:PATH");
    }
    let mut target = Target::from_args(&args)?;
    let selector = args.selector.as_deref().unwrap_or("0");

    if args.plain || args.dump {
        let (heap, image) = target.heap()?;
        let index = heap.resolve_index(selector)?;
        let mut stdout = io::stdout().lock();
        if args.dump {
            plain::print_dump(&mut stdout, heap, image, index)?;
        } else {
            let mut stdin = io::stdin().lock();
            plain::print_heap(&mut stdout, &mut stdin, heap, image, index, args.page_len)
                .context("Could not write heap")?;
        }
        return Ok(());
    }

    let mut state = State::new(target);
    state.goto(selector);

    // Setup terminal
    let mut terminal = ratatui::init();
    let res = run_app(&mut terminal, &mut state);
    ratatui::restore();

    if let Err(err) = res {
        bail!("{err:?}")
    }

    Ok(())
}

fn init_logging(log_path: Option<&String>) -> anyhow::Result<()> {
    if let Some(log_path) = log_path {
        let log_file =
            Arc::new(Mutex::new(File::create(log_path).context("Could not create log file")?));
        Builder::from_env(Env::default().default_filter_or("info"))
            .format(move |buf, record| {
                let log_msg = format!(
                    "{} [{}] - {}\n",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.args()
                );
                if let Ok(mut log_file) = log_file.lock() {
                    log_file.write_all(log_msg.as_bytes())?;
                }
                writeln!(buf, "{}", log_msg.trim_end())
            })
            .target(env_logger::Target::Pipe(Box::new(std::io::sink()))) // Disable stdout/stderr
            .init();
        info!("logging to {log_path}");
    }
    Ok(())
}

fn run_app(terminal: &mut DefaultTerminal, state: &mut State) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui::ui(f, state))?;

        if event::poll(Duration::from_millis(250))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && handle_key(state, key)
        {
            return Ok(());
        }
    }
}

/// Apply one key press, returning `true` once the user confirmed quitting
fn handle_key(state: &mut State, key: KeyEvent) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }
    match (state.input_mode, key.code, state.mode) {
        // quit confirmation
        (_, KeyCode::Enter, Mode::QuitConfirmation) => return true,
        (_, KeyCode::Esc, Mode::QuitConfirmation) => state.mode = state.previous_mode,
        (_, _, Mode::QuitConfirmation) => (),
        // goto prompt
        (InputMode::Editing, KeyCode::Esc, _) => state.input_mode = InputMode::Normal,
        (InputMode::Editing, KeyCode::Enter, _) => {
            let token = state.input.value().trim().to_owned();
            state.goto(&token);
            state.input.reset();
            state.input_mode = InputMode::Normal;
        }
        (InputMode::Editing, _, _) => {
            state.input.handle_event(&Event::Key(key));
        }
        (InputMode::Normal, KeyCode::Char('q'), _) => {
            state.previous_mode = state.mode;
            state.mode = Mode::QuitConfirmation;
        }
        (InputMode::Normal, KeyCode::Char('i'), _) => state.input_mode = InputMode::Editing,
        (InputMode::Normal, KeyCode::Char('r'), _) => state.reload(),
        (InputMode::Normal, KeyCode::Char('H'), Mode::Heap) => state.open_hexdump(),
        (InputMode::Normal, KeyCode::Char('H') | KeyCode::Esc, Mode::Hexdump) => {
            state.mode = Mode::Heap;
        }
        (InputMode::Normal, code, _) => state.scroll(code),
    }
    false
}

#[cfg(test)]
mod tests {
    use augury::{SyntheticHeap, WordSize};
    use ratatui::{Terminal, backend::TestBackend};

    use super::*;
    use crate::target::tests::{test_dir, write_target};

    fn sample() -> SyntheticHeap {
        let mut heap = SyntheticHeap::new(WordSize::Bits64, 0x555555559000);
        heap.chunk(0, 0x291);
        let fast = heap.chunk(0, 0x21);
        let small = heap.chunk(0, 0x91);
        heap.chunk(0x90, 0x30);
        heap.set_fastbin(0, fast);
        heap.set_fd(small, 0x555555559000);
        heap.set_bk(small, 0x555555559000);
        heap
    }

    fn state(name: &str, heap: &SyntheticHeap) -> State {
        let dir = test_dir(name);
        let args = write_target(&dir, heap);
        State::new(Target::from_args(&args).unwrap())
    }

    fn press(state: &mut State, code: KeyCode) -> bool {
        handle_key(state, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn render(state: &mut State) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|f| ui::ui(f, state)).unwrap();
        terminal.backend().to_string()
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "auspex",
            "-r",
            "0x555555559000:heap.bin",
            "--symbol",
            "main_arena.top=0x5555555593b0",
            "--ptr-size",
            "32",
            "--endian",
            "big",
            "--plain",
            "0x555555559290",
        ])
        .unwrap();
        assert_eq!(args.region, vec!["0x555555559000:heap.bin"]);
        assert_eq!(args.ptr_size, PtrSize::Size32);
        assert_eq!(args.endian, EndianArg::Big);
        assert_eq!(args.page_len, DEFAULT_PAGE_LEN);
        assert!(args.plain);
        assert_eq!(args.selector.as_deref(), Some("0x555555559290"));

        assert!(Args::try_parse_from(["auspex", "--ptr-size", "16"]).is_err());
    }

    #[test]
    fn test_scroll() {
        let mut scroll = Scroll::default();
        scroll.down(1, 5);
        assert_eq!(scroll.scroll, 1);
        scroll.down(50, 5);
        assert_eq!(scroll.scroll, 4);
        scroll.up(2);
        assert_eq!(scroll.scroll, 2);
        scroll.up(50);
        assert_eq!(scroll.scroll, 0);
        scroll.end(5);
        assert_eq!(scroll.scroll, 4);
        scroll.reset();
        assert_eq!(scroll.scroll, 0);
    }

    #[test]
    fn test_goto_prompt() {
        let mut state = state("goto", &sample());

        press(&mut state, KeyCode::Char('i'));
        assert_eq!(state.input_mode, InputMode::Editing);
        for c in "0x5555555592c0".chars() {
            press(&mut state, KeyCode::Char(c));
        }
        press(&mut state, KeyCode::Enter);
        assert_eq!(state.input_mode, InputMode::Normal);
        assert_eq!(state.heap_scroll.scroll, 2);
        assert_eq!(state.result, "HEAP[2]");

        press(&mut state, KeyCode::Char('i'));
        for c in "99".chars() {
            press(&mut state, KeyCode::Char(c));
        }
        press(&mut state, KeyCode::Enter);
        assert_eq!(state.heap_scroll.scroll, 2);
        assert_eq!(state.result, "Index 99 is out of range (0..=4)");
    }

    #[test]
    fn test_scroll_keys_reach_top_chunk() {
        let mut state = state("scroll", &sample());
        press(&mut state, KeyCode::Char('G'));
        assert_eq!(state.heap_scroll.scroll, 4);
        press(&mut state, KeyCode::Char('j'));
        assert_eq!(state.heap_scroll.scroll, 4);
        press(&mut state, KeyCode::Char('k'));
        assert_eq!(state.heap_scroll.scroll, 3);
        press(&mut state, KeyCode::Char('g'));
        assert_eq!(state.heap_scroll.scroll, 0);
    }

    #[test]
    fn test_hexdump_key() {
        let mut state = state("hexdump", &sample());
        state.goto("1");
        press(&mut state, KeyCode::Char('H'));
        assert_eq!(state.mode, Mode::Hexdump);
        let (address, data) = state.hexdump.clone().unwrap();
        assert_eq!(address, 0x555555559290);
        assert_eq!(data.len(), 0x20);

        press(&mut state, KeyCode::Esc);
        assert_eq!(state.mode, Mode::Heap);

        // the top chunk dumps its header
        press(&mut state, KeyCode::Char('G'));
        press(&mut state, KeyCode::Char('H'));
        assert_eq!(state.hexdump.as_ref().unwrap().1.len(), 0x10);
    }

    #[test]
    fn test_quit_confirmation() {
        let mut state = state("quit", &sample());
        assert!(!press(&mut state, KeyCode::Char('q')));
        assert_eq!(state.mode, Mode::QuitConfirmation);
        assert!(!press(&mut state, KeyCode::Esc));
        assert_eq!(state.mode, Mode::Heap);
        press(&mut state, KeyCode::Char('q'));
        assert!(press(&mut state, KeyCode::Enter));
    }

    #[test]
    fn test_reload_key() {
        let mut heap = sample();
        let mut state = state("reload-key", &heap);
        let fast_in_use =
            |state: &mut State| state.target.heap().unwrap().0.get(1).unwrap().in_use;
        assert!(!fast_in_use(&mut state));

        // drain the fast bin on disk
        heap.set_fastbin(0, 0);
        write_target(&test_dir("reload-key"), &heap);
        assert!(!fast_in_use(&mut state));

        press(&mut state, KeyCode::Char('r'));
        assert_eq!(state.result, "reloaded, generation 2");
        assert!(fast_in_use(&mut state));
    }

    #[test]
    fn test_render_heap() {
        let mut state = state("render", &sample());
        let view = render(&mut state);
        assert!(view.contains("(Legend: in use, not in use)"));
        assert!(view.contains("HEAP[0] is at 0x555555559000"));
        assert!(view.contains("HEAP[2] is at 0x5555555592b0"));
        assert!(view.contains("0x555555559000 --> 0x0"));
        assert!(view.contains("goto> "));

        press(&mut state, KeyCode::Char('q'));
        let view = render(&mut state);
        assert!(view.contains("Quit? Enter to confirm, Esc to cancel"));
    }

    #[test]
    fn test_render_corrupt_heap() {
        let mut heap = SyntheticHeap::new(WordSize::Bits64, 0x1000);
        heap.chunk(0, 0x21);
        let zero = heap.chunk(0, 0x21);
        heap.chunk(0, 0x21);
        heap.set_word(zero + 8, 0);
        let mut state = state("render-corrupt", &heap);
        let view = render(&mut state);
        assert!(view.contains("Heap walk diverged at 0x1020"));
    }
}
