use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use augury::{Heap, HeapCache, HeapError, HeapLayout, MemoryImage, Symbol, WordSize};
use deku::ctx::Endian;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Args, EndianArg, PtrSize};

/// `ADDR:PATH`
static RE_REGION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^:]+):(.+)$").unwrap());

/// `NAME=VALUE`
static RE_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_.]*)=(.+)$").unwrap());

static RE_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^()]+)\)").unwrap());

pub fn resolve_home(path: &str) -> Option<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = env::var("HOME").ok()?;
        return Some(Path::new(&home).join(rest));
    }
    Some(PathBuf::from(path))
}

/// Replace every innermost `(expr)` with its evaluated result, leaving it bare on failure
pub fn resolve_paren_expressions(val: &mut String) {
    *val = RE_PAREN
        .replace_all(&*val, |caps: &regex::Captures| {
            let expression = &caps[1];
            match evalexpr::eval(expression) {
                Ok(result) => result.to_string(),
                Err(_) => expression.to_string(),
            }
        })
        .to_string();
}

/// Decimal, `0x` hex, or either wrapped in parenthesised arithmetic
pub fn parse_value(val: &str) -> anyhow::Result<u64> {
    let mut val = val.trim().to_owned();
    resolve_paren_expressions(&mut val);

    let parsed = match val.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => val.parse::<u64>(),
    };
    parsed.with_context(|| format!("Invalid value: `{val}`"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub address: u64,
    pub path: PathBuf,
}

impl Region {
    pub fn parse(arg: &str) -> anyhow::Result<Self> {
        let Some(caps) = RE_REGION.captures(arg) else {
            bail!("Expected ADDR:PATH for --region, got `{arg}`");
        };
        let address = parse_value(&caps[1])?;
        let Some(path) = resolve_home(caps[2].trim()) else {
            bail!("Could not resolve home directory in `{}`", &caps[2]);
        };
        Ok(Self { address, path })
    }
}

pub fn parse_symbol(arg: &str) -> anyhow::Result<(Symbol, u64)> {
    let Some(caps) = RE_SYMBOL.captures(arg.trim()) else {
        bail!("Expected NAME=VALUE for --symbol, got `{arg}`");
    };
    let symbol = caps[1].parse::<Symbol>().map_err(anyhow::Error::msg)?;
    let value = parse_value(&caps[2])?;
    Ok((symbol, value))
}

/// Everything needed to rebuild the memory image, and the image itself
#[derive(Debug)]
pub struct Target {
    pub word_size: WordSize,
    pub endian: Endian,
    pub regions: Vec<Region>,
    pub symbols: Vec<(Symbol, u64)>,
    pub layout: HeapLayout,
    pub image: MemoryImage,
    cache: HeapCache,
    generation: u64,
}

impl Target {
    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        let word_size = match args.ptr_size {
            PtrSize::Size32 => WordSize::Bits32,
            PtrSize::Size64 => WordSize::Bits64,
        };
        let endian = match args.endian {
            EndianArg::Little => Endian::Little,
            EndianArg::Big => Endian::Big,
        };
        let regions = args.region.iter().map(|r| Region::parse(r)).collect::<Result<_, _>>()?;
        let symbols = args.symbol.iter().map(|s| parse_symbol(s)).collect::<Result<_, _>>()?;

        let mut target = Self {
            word_size,
            endian,
            regions,
            symbols,
            layout: HeapLayout::new(word_size),
            image: MemoryImage::new(word_size, endian),
            cache: HeapCache::new(),
            generation: 0,
        };
        target.reload()?;
        Ok(target)
    }

    /// Re-read every region file and start a new cache generation
    pub fn reload(&mut self) -> anyhow::Result<()> {
        let mut image = MemoryImage::new(self.word_size, self.endian);
        for region in &self.regions {
            let data = fs::read(&region.path)
                .with_context(|| format!("Could not read region `{}`", region.path.display()))?;
            debug!("mapped {} bytes at {:#x}", data.len(), region.address);
            image.add_segment(region.address, data);
        }
        for (symbol, value) in &self.symbols {
            image.set_symbol(*symbol, *value);
        }

        self.image = image;
        self.generation += 1;
        info!("loaded {} regions, generation {}", self.regions.len(), self.generation);
        Ok(())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The heap as of the current generation, along with the memory it was read from
    pub fn heap(&mut self) -> Result<(&Heap, &MemoryImage), HeapError> {
        let heap = self.cache.get_or_build(self.generation, &self.image, &self.layout)?;
        Ok((heap, &self.image))
    }
}
