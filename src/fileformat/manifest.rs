use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;

use crate::dispatch::SamplePair;
use crate::runtime::Error;
use crate::runtime::Result;

/// Parsed columns of one pair-list line
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PairLine {
    pub primary: String,
    pub secondary: Option<String>,
}

////////////////////////
/// Parse one pair-list line: "primary [secondary]", whitespace separated.
/// Lines that do not mention a BAM file are headers or comments and give None.
/// A line that starts with whitespace has no primary column
pub fn parse_pair_line(line: &str) -> Option<std::result::Result<PairLine, String>> {
    let line = line.trim_end();
    if !line.contains("bam") {
        return None;
    }
    if line.starts_with(char::is_whitespace) {
        return Some(Err(format!("no primary file in '{}'", line.trim())));
    }

    let mut columns = line.split_whitespace();
    let primary = columns.next()?.to_string();
    let secondary = columns.next().map(String::from);
    if columns.next().is_some() {
        return Some(Err(format!("more than two columns in '{}'", line)));
    }
    Some(Ok(PairLine { primary, secondary }))
}

/// Parse a command line pair "primary[:secondary]"
pub fn parse_pair_arg(arg: &str) -> std::result::Result<PairLine, String> {
    let (primary, secondary) = match arg.split_once(':') {
        Some((p, s)) => (p.trim(), Some(s.trim())),
        None => (arg.trim(), None),
    };
    if primary.is_empty() {
        return Err(format!("no primary file in '{}'", arg));
    }
    Ok(PairLine {
        primary: primary.to_string(),
        secondary: secondary.filter(|s| !s.is_empty()).map(String::from),
    })
}

fn to_sample_pair(input_dir: &Path, line: PairLine) -> SamplePair {
    SamplePair {
        primary: input_dir.join(line.primary),
        secondary: line.secondary.map(|s| input_dir.join(s)),
    }
}

///////////////////////////////
/// Lazily reads sample pairs from a pair-list, one line per call
pub struct PairListReader<R> {
    lines: std::io::Lines<R>,
    source_name: String,
    input_dir: PathBuf,
    line_no: usize,
    done: bool,
}

impl PairListReader<BufReader<File>> {
    pub fn open(path: &Path, input_dir: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("Could not open pair list {}", path.display()))?;
        Ok(PairListReader::new(
            BufReader::new(file),
            &path.display().to_string(),
            input_dir,
        ))
    }
}

impl<R: BufRead> PairListReader<R> {
    pub fn new(reader: R, source_name: &str, input_dir: &Path) -> Self {
        PairListReader {
            lines: reader.lines(),
            source_name: source_name.to_string(),
            input_dir: input_dir.to_path_buf(),
            line_no: 0,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for PairListReader<R> {
    type Item = Result<SamplePair>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.line_no += 1;
            let line = match self.lines.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    // Cannot resync after an I/O error, so this is the last record
                    self.done = true;
                    return Some(Err(Error::malformed_input(&self.source_name, self.line_no, e.to_string())));
                }
                Some(Ok(line)) => line,
            };

            match parse_pair_line(&line) {
                None => continue,
                Some(Ok(pair)) => return Some(Ok(to_sample_pair(&self.input_dir, pair))),
                Some(Err(msg)) => return Some(Err(Error::malformed_input(&self.source_name, self.line_no, msg))),
            }
        }
        None
    }
}

/// Sample pairs given directly on the command line
pub fn pairs_from_args(args: Vec<String>, input_dir: &Path) -> impl Iterator<Item = Result<SamplePair>> + Send {
    let input_dir = input_dir.to_path_buf();
    args.into_iter().enumerate().map(move |(i, arg)| {
        parse_pair_arg(&arg)
            .map(|pair| to_sample_pair(&input_dir, pair))
            .map_err(|msg| Error::malformed_input("--pairs", i + 1, msg))
    })
}
