use std::io::{self, BufRead, Write};

use augury::{Control, Environment, Heap, MemoryImage, Pager, WordSize};
use log::debug;

use crate::ui::heap::ChunkBlock;

const IN_USE_MARK: &str = "[+]";
const FREE_MARK: &str = "[-]";

/// Words per row of `--dump` output
const DUMP_ROW_WORDS: usize = 2;

/// Print every chunk from `start` on, pausing for a line on `input` after each page
pub fn print_heap<W: Write, R: BufRead>(
    out: &mut W,
    input: &mut R,
    heap: &Heap,
    env: &MemoryImage,
    start: usize,
    page_len: usize,
) -> io::Result<()> {
    writeln!(out, "(Legend: {IN_USE_MARK} in use, {FREE_MARK} not in use)")?;
    writeln!(out, "heap base: {:#x}", heap.base)?;
    for warning in &heap.warnings {
        writeln!(out, "warning: {warning}")?;
    }

    let mut pager = Pager::new(start, heap.len(), page_len);
    while let Some(page) = pager.next_page() {
        for index in page {
            let Some(chunk) = heap.get(index) else {
                continue;
            };
            let block = ChunkBlock::new(heap, env, index, chunk);
            let mark = if block.in_use { IN_USE_MARK } else { FREE_MARK };
            writeln!(out)?;
            writeln!(out, "{mark} {}", block.header())?;
            for (label, value) in block.fields() {
                writeln!(out, "{label:<9}: {value}")?;
            }
        }

        if pager.has_more() {
            write!(out, "--More--({}/{})", pager.position(), pager.total())?;
            out.flush()?;
            pager.resume(read_control(input)?);
        }
    }
    Ok(())
}

/// `q` stops, end of input stops, anything else continues
fn read_control<R: BufRead>(input: &mut R) -> io::Result<Control> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        debug!("pager input closed");
        return Ok(Control::Stop);
    }
    Ok(if line.trim() == "q" { Control::Stop } else { Control::Continue })
}

/// Print the raw words behind `index`, as many per row as fit [`DUMP_ROW_WORDS`]
pub fn print_dump<W: Write>(
    out: &mut W,
    heap: &Heap,
    env: &MemoryImage,
    index: usize,
) -> anyhow::Result<()> {
    let region = heap.dump_region(index)?;
    let word = env.word_size().bytes() as usize;
    let bytes = env.read_bytes(region.address, region.len_bytes(env.word_size()) as usize)?;
    let width = match env.word_size() {
        WordSize::Bits32 => 8,
        WordSize::Bits64 => 16,
    };

    for (row, raw) in bytes.chunks(word * DUMP_ROW_WORDS).enumerate() {
        let address = region.address + (row * word * DUMP_ROW_WORDS) as u64;
        write!(out, "{address:#x}:")?;
        for offset in (0..raw.len()).step_by(word) {
            let value = env.read_word(address + offset as u64, 0)?;
            write!(out, " 0x{value:0width$x}")?;
        }
        writeln!(out, "  {}", hex::encode(raw))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use augury::{HeapLayout, SyntheticHeap, build_chunk_map};
    use deku::ctx::Endian;
    use insta::assert_snapshot;

    use super::*;

    fn sample() -> SyntheticHeap {
        let mut heap = SyntheticHeap::new(WordSize::Bits64, 0x555555559000);
        heap.chunk(0, 0x291);
        let fast = heap.chunk(0, 0x21);
        let small = heap.chunk(0, 0x91);
        heap.chunk(0x90, 0x30);
        heap.chunk(0, 0x21);
        heap.chunk(0, 0x21);
        heap.set_fastbin(0, fast);
        heap.set_fd(small, 0x555555559000);
        heap.set_bk(small, 0x555555559000);
        heap
    }

    fn run(image: &MemoryImage, start: usize, page_len: usize, input: &str) -> String {
        let heap = build_chunk_map(image, &HeapLayout::new(image.word_size())).unwrap();
        let mut out = Vec::new();
        print_heap(&mut out, &mut Cursor::new(input), &heap, image, start, page_len).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_print_heap_pages() {
        let image = sample().build();
        let output = run(&image, 0, 4, "\n");
        assert_snapshot!(output, @r"
        (Legend: [+] in use, [-] not in use)
        heap base: 0x555555559000

        [+] HEAP[0] is at 0x555555559000
        prev_size: 0x0
        size     : 0x291
        fd       : 0x0
        bk       : 0x0

        [-] HEAP[1] is at 0x555555559290
        prev_size: 0x0
        size     : 0x21
        fd       : 0x0
        bk       : 0x0

        [-] HEAP[2] is at 0x5555555592b0
        prev_size: 0x0
        size     : 0x91
        fd       : 0x555555559000 --> 0x0
        bk       : 0x555555559000 --> 0x0

        [+] HEAP[3] is at 0x555555559340
        prev_size: 0x90
        size     : 0x30
        fd       : 0x0
        bk       : 0x0
        --More--(4/6)
        [+] HEAP[4] is at 0x555555559370
        prev_size: 0x0
        size     : 0x21
        fd       : 0x0
        bk       : 0x0

        [+] HEAP[5] is at 0x555555559390
        prev_size: 0x0
        size     : 0x21
        fd       : 0x0
        bk       : 0x0
        ");
    }

    #[test]
    fn test_print_heap_quit() {
        let image = sample().build();
        let output = run(&image, 1, 2, "q\n");
        assert!(output.contains("HEAP[1]"));
        assert!(output.contains("HEAP[2]"));
        assert!(output.ends_with("--More--(3/6)"));
        assert!(!output.contains("HEAP[3]"));
    }

    #[test]
    fn test_print_heap_unpaged() {
        let image = sample().build();
        let output = run(&image, 4, 0, "");
        assert!(!output.contains("--More--"));
        assert!(!output.contains("HEAP[3]"));
        assert!(output.contains("HEAP[4]"));
        assert!(output.contains("HEAP[5]"));
    }

    #[test]
    fn test_print_heap_warnings() {
        let mut heap = SyntheticHeap::new(WordSize::Bits64, 0x1000);
        heap.chunk(0, 0x21);
        heap.chunk(0x40, 0x20);
        let image = heap.build();
        let output = run(&image, 0, 4, "");
        assert!(output.lines().nth(2).unwrap().starts_with("warning: chunk 0x1020"));
    }

    #[test]
    fn test_print_dump() {
        let mut heap = SyntheticHeap::new(WordSize::Bits64, 0x1000);
        let a = heap.chunk(0, 0x21);
        heap.set_fd(a, 0x4142434445464748);
        let image = heap.build();
        let built = build_chunk_map(&image, &HeapLayout::new(WordSize::Bits64)).unwrap();

        let mut out = Vec::new();
        print_dump(&mut out, &built, &image, 0).unwrap();
        assert_snapshot!(String::from_utf8(out).unwrap(), @r"
        0x1000: 0x0000000000000000 0x0000000000000021  00000000000000002100000000000000
        0x1010: 0x4142434445464748 0x0000000000000000  48474645444342410000000000000000
        ");

        // the top entry dumps its two header words
        let mut out = Vec::new();
        print_dump(&mut out, &built, &image, 1).unwrap();
        assert_snapshot!(String::from_utf8(out).unwrap(), @r"
        0x1020: 0x0000000000000000 0x0000000000020d01  0000000000000000010d020000000000
        ");
    }

    #[test]
    fn test_print_dump_big_endian_32() {
        let mut heap = SyntheticHeap::new(WordSize::Bits32, 0x8000).endian(Endian::Big);
        heap.chunk(0, 0x11);
        let image = heap.build();
        let built = build_chunk_map(&image, &HeapLayout::new(WordSize::Bits32)).unwrap();

        let mut out = Vec::new();
        print_dump(&mut out, &built, &image, 0).unwrap();
        assert_snapshot!(String::from_utf8(out).unwrap(), @r"
        0x8000: 0x00000000 0x00000011  0000000000000011
        0x8008: 0x00000000 0x00000000  0000000000000000
        ");
    }
}
