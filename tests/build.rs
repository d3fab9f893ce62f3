use std::{
    env,
    error::Error,
    ffi::OsStr,
    fs::{self, File},
    io::{self, BufRead},
    path::Path,
};
use walkdir::WalkDir;

const DEFAULT_HOT_THRESHOLD: u64 = 5;

struct Test {
    hot_threshold: u64,
    expected: Vec<(String, String)>,
    ignore: bool,
}

/// Reads the `#` header of a hex listing: `# expect: $reg=value ...`, `# hot-threshold: N` and
/// `# ignore` lines. Files without any expectation aren't tests.
fn parse_file<P>(filename: P) -> Option<Test>
where
    P: AsRef<Path>,
{
    let file = File::open(&filename)
        .unwrap_or_else(|_| panic!("Failed to open file {}", filename.as_ref().display()));
    let mut test = Test {
        hot_threshold: DEFAULT_HOT_THRESHOLD,
        expected: Vec::new(),
        ignore: false,
    };

    for line in io::BufReader::new(file).lines() {
        let line = line.unwrap();
        let Some(comment) = line.strip_prefix('#') else {
            break;
        };
        let comment = comment.trim();
        if comment == "ignore" {
            test.ignore = true;
        } else if let Some(threshold) = comment.strip_prefix("hot-threshold:") {
            test.hot_threshold = threshold.trim().parse().unwrap_or_else(|_| {
                panic!(
                    "Bad hot threshold in `{}`: {}",
                    filename.as_ref().display(),
                    threshold
                )
            });
        } else if let Some(expect) = comment.strip_prefix("expect:") {
            for pair in expect.split_whitespace() {
                let Some((reg, value)) = pair.split_once('=') else {
                    println!(
                        "cargo:warning=Ignoring `{}` in test file `{}`",
                        pair,
                        filename.as_ref().display()
                    );
                    continue;
                };
                test.expected.push((reg.to_owned(), value.to_owned()));
            }
        }
    }

    if test.expected.is_empty() {
        println!(
            "cargo:warning=Test file `{}` has no `# expect:` line",
            filename.as_ref().display()
        );
        return None;
    }
    Some(test)
}

fn make_save(name: &OsStr) -> String {
    let name = name.to_string_lossy();

    let mut out = String::new();
    for c in name.chars() {
        if c.is_ascii_alphabetic() {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out
}

fn main() -> Result<(), Box<dyn Error>> {
    let out_dir = env::var("OUT_DIR").unwrap();
    let input_dir = "test_files";

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed={}", input_dir);
    let mut output = String::new();

    let mut i = 0;
    for entry in WalkDir::new(input_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if let Some(test) = parse_file(path) {
            let expected = test
                .expected
                .iter()
                .map(|(reg, value)| format!(r#"("{reg}", {value})"#))
                .collect::<Vec<_>>()
                .join(", ");
            let call = format!(
                r#"differential_test("{}", {}, &[{}])"#,
                path.display(),
                test.hot_threshold,
                expected
            );

            let test_name = path.strip_prefix(input_dir).unwrap();
            let test_name = make_save(test_name.as_os_str());

            let test_specifier = match test.ignore {
                true => "#[test]\n#[ignore]",
                false => "#[test]",
            };

            let test = format!(
                "{}\nfn {}_{}() {{\n{};\n}}\n",
                test_specifier, test_name, i, call
            );

            output.push_str(&test);
            i += 1;
        }
    }

    fs::write(out_dir + "/tests.rs", output).expect("Failed to write to tests.rs");

    Ok(())
}
