use anyhow::{Context, Result};
use clap::Parser;
use gml_features::parser::{parse_gml_file, ParseOptions, DEFAULT_PREFIX};
use gml_features::{CsvWriter, Ogr2Ogr};
use rayon::ThreadPoolBuilder;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 入力GMLファイル、シェープファイル、またはディレクトリ
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// 出力ディレクトリ
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// コンテキストIDとして使う属性名
    #[arg(short, long, value_name = "NAME")]
    context: String,

    /// 出力する属性名（'|' 区切り）
    #[arg(short, long, value_name = "A|B|C", value_delimiter = '|')]
    attributes: Vec<String>,

    /// レイヤー要素の名前空間プレフィックス
    #[arg(long, default_value = DEFAULT_PREFIX)]
    prefix: String,

    /// 並列処理スレッド数（デフォルト: CPUコア数）
    #[arg(short, long)]
    threads: Option<usize>,

    /// ogr2ogr 実行ファイルのパス
    #[arg(long, value_name = "PATH", default_value = "ogr2ogr")]
    ogr2ogr: PathBuf,
}

impl Args {
    fn parse_options(&self) -> ParseOptions {
        ParseOptions::new(self.context.clone(), self.attributes.clone()).with_prefix(self.prefix.clone())
    }
}

#[derive(Debug, Clone, Copy)]
enum FileType {
    Gml,
    Shapefile,
}

impl FileType {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "gml" => Some(FileType::Gml),
            "shp" => Some(FileType::Shapefile),
            _ => None,
        }
    }
}

fn main() -> Result<()> {
    // ログの初期化
    tracing_subscriber::fmt::init();

    // CLI引数の解析
    let args = Args::parse();

    // 処理開始時間を記録
    let start_time = std::time::Instant::now();

    // スレッドプールの設定
    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build thread pool")?;
    }

    // 出力ディレクトリの作成
    fs::create_dir_all(&args.output)?;

    // 入力パスの処理
    if args.input.is_file() {
        match FileType::from_path(&args.input) {
            Some(file_type) => {
                info!("Processing {:?} file: {:?}", file_type, args.input);
                process_input(&args.input, file_type, &args.output, &args)?;
            }
            None => {
                error!("Unsupported file type: {:?}", args.input);
                anyhow::bail!("Input file must be .gml or .shp");
            }
        }
    } else if args.input.is_dir() {
        // ディレクトリの処理
        info!("Processing directory: {:?}", args.input);
        process_directory(&args.input, &args)?;
    } else {
        error!("Invalid input path: {:?}", args.input);
        anyhow::bail!("Input path must be a file or directory");
    }

    // 処理時間を表示
    let elapsed = start_time.elapsed();
    info!("Total processing time: {:?}", elapsed);

    Ok(())
}

fn process_input(path: &Path, file_type: FileType, output_dir: &Path, args: &Args) -> Result<()> {
    match file_type {
        FileType::Gml => process_file(path, output_dir, args),
        FileType::Shapefile => process_shapefile(path, output_dir, args),
    }
}

fn process_file(path: &Path, output_dir: &Path, args: &Args) -> Result<()> {
    info!("Processing file: {:?}", path);

    let options = args.parse_options();

    // GMLファイルを解析
    let collection =
        parse_gml_file(path, &options).with_context(|| format!("Failed to parse {:?}", path))?;

    info!(
        "Parsed successfully: {:?} ({} features)",
        path,
        collection.len()
    );

    // CSVとして出力
    let output_path = output_path(path, output_dir, "csv");

    let writer = CsvWriter::new();
    writer.write(&collection, &options, &output_path)?;
    info!("Written CSV: {:?}", output_path);

    Ok(())
}

fn process_shapefile(path: &Path, output_dir: &Path, args: &Args) -> Result<()> {
    // ogr2ogrでGMLに変換してから処理
    let gml_path = output_path(path, output_dir, "gml");

    Ogr2Ogr::with_program(&args.ogr2ogr).convert(path, &gml_path)?;
    info!("Converted shapefile: {:?} -> {:?}", path, gml_path);

    process_file(&gml_path, output_dir, args)
}

/// `<output_dir>/<stem>.<extension>`
fn output_path(input: &Path, output_dir: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("gml_output");
    output_dir.join(format!("{}.{}", stem, extension))
}

/// Output directory for `path`, mirroring its location below `input_root`.
fn mirrored_output_dir(path: &Path, input_root: &Path, output_root: &Path) -> PathBuf {
    let relative = path
        .parent()
        .and_then(|parent| parent.strip_prefix(input_root).ok())
        .unwrap_or_else(|| Path::new(""));
    output_root.join(relative)
}

fn process_directory(dir: &Path, args: &Args) -> Result<()> {
    use rayon::prelude::*;

    // GML/SHPファイルを再帰的に収集
    let input_files = collect_input_files(dir)?;
    info!("Found {} input files (GML/SHP)", input_files.len());

    // 出力先はサブディレクトリ構成をそのまま保つ
    let jobs: Vec<(&Path, FileType, PathBuf)> = input_files
        .iter()
        .map(|(path, file_type)| {
            (
                path.as_path(),
                *file_type,
                mirrored_output_dir(path, dir, &args.output),
            )
        })
        .collect();
    check_output_conflicts(&jobs)?;

    for (_, _, output_dir) in &jobs {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;
    }

    // 並列処理でファイルを変換
    let results: Vec<Result<()>> = jobs
        .par_iter()
        .map(|(path, file_type, output_dir)| process_input(path, *file_type, output_dir, args))
        .collect();

    // エラーをチェック
    let mut errors = Vec::new();
    for ((path, _, _), result) in jobs.iter().zip(results) {
        if let Err(e) = result {
            errors.push(format!("{}: {:#}", path.display(), e));
        }
    }

    if !errors.is_empty() {
        error!("Failed to process {} files:", errors.len());
        for err in &errors {
            error!("  {}", err);
        }
        anyhow::bail!("{} files failed to process", errors.len());
    }

    Ok(())
}

/// Fails when two inputs would write the same CSV (`sites.gml` next to `sites.shp`).
fn check_output_conflicts(jobs: &[(&Path, FileType, PathBuf)]) -> Result<()> {
    let mut targets: HashMap<PathBuf, &Path> = HashMap::new();
    let mut conflicts = Vec::new();

    for (path, _, output_dir) in jobs {
        let target = output_path(path, output_dir, "csv");
        if let Some(previous) = targets.insert(target.clone(), path) {
            conflicts.push(format!(
                "{} and {} both write {}",
                previous.display(),
                path.display(),
                target.display()
            ));
        }
    }

    if !conflicts.is_empty() {
        for conflict in &conflicts {
            error!("  {}", conflict);
        }
        anyhow::bail!("{} output paths are claimed by more than one input", conflicts.len());
    }

    Ok(())
}

fn collect_input_files(dir: &Path) -> Result<Vec<(PathBuf, FileType)>> {
    let mut files = Vec::new();

    let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            // サブディレクトリを再帰的に探索
            files.extend(collect_input_files(&path)?);
        } else if let Some(file_type) = FileType::from_path(&path) {
            files.push((path, file_type));
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use tempfile::TempDir;

    #[test]
    fn test_attributes_are_pipe_delimited() {
        let args = Args::try_parse_from([
            "gml2csv",
            "sites.gml",
            "-o",
            "out",
            "-c",
            "siteName",
            "-a",
            "material|period",
        ])
        .unwrap();

        let options = args.parse_options();
        assert_eq!(options.context_attribute, "siteName");
        assert_eq!(options.attributes, vec!["material", "period"]);
        assert_eq!(options.prefix, "ogr");
        assert_eq!(args.ogr2ogr, PathBuf::from("ogr2ogr"));
    }

    #[test]
    fn test_file_type_detection() {
        assert!(matches!(FileType::from_path(Path::new("a/b.GML")), Some(FileType::Gml)));
        assert!(matches!(FileType::from_path(Path::new("b.shp")), Some(FileType::Shapefile)));
        assert!(FileType::from_path(Path::new("b.xml")).is_none());
        assert!(FileType::from_path(Path::new("noext")).is_none());
    }

    const SITE_GML: &str = r#"<ogr:FeatureCollection xmlns:ogr="http://ogr.maptools.org/" xmlns:gml="http://www.opengis.net/gml">
  <gml:featureMember>
    <ogr:sites fid="{fid}">
      <ogr:geometryProperty><gml:Point><gml:coordinates>1,2</gml:coordinates></gml:Point></ogr:geometryProperty>
      <ogr:siteName>{name}</ogr:siteName>
    </ogr:sites>
  </gml:featureMember>
</ogr:FeatureCollection>"#;

    fn site_gml(fid: &str, name: &str) -> String {
        SITE_GML.replace("{fid}", fid).replace("{name}", name)
    }

    fn directory_args(input: &Path, output: &Path) -> Args {
        Args::try_parse_from([
            OsStr::new("gml2csv"),
            input.as_os_str(),
            OsStr::new("-o"),
            output.as_os_str(),
            OsStr::new("-c"),
            OsStr::new("siteName"),
        ])
        .unwrap()
    }

    #[test]
    fn test_directory_reports_failed_files() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::write(input.path().join("good.gml"), site_gml("good.0", "Avebury")).unwrap();
        fs::write(input.path().join("broken.gml"), "<ogr:FeatureCollection><gml:featureMember>").unwrap();
        fs::write(input.path().join("notes.txt"), "ignored").unwrap();

        let args = directory_args(input.path(), output.path());
        let err = process_directory(input.path(), &args).unwrap_err();
        assert!(err.to_string().starts_with("1 files failed"), "{}", err);

        // 正常なファイルは出力されている
        let csv = fs::read_to_string(output.path().join("good.csv")).unwrap();
        assert!(csv.contains(r#""good.0","Avebury""#), "{}", csv);
        assert!(!output.path().join("broken.csv").exists());
    }

    #[test]
    fn test_directory_keeps_subdirectory_layout() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        for area in ["north", "south"] {
            let dir = input.path().join(area);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("sites.gml"), site_gml(&format!("{}.0", area), area)).unwrap();
        }

        let args = directory_args(input.path(), output.path());
        process_directory(input.path(), &args).unwrap();

        let north = fs::read_to_string(output.path().join("north").join("sites.csv")).unwrap();
        let south = fs::read_to_string(output.path().join("south").join("sites.csv")).unwrap();
        assert!(north.contains(r#""north.0","north""#));
        assert!(south.contains(r#""south.0","south""#));
        assert!(!output.path().join("sites.csv").exists());
    }

    #[test]
    fn test_directory_rejects_colliding_outputs() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::write(input.path().join("sites.gml"), site_gml("sites.0", "Avebury")).unwrap();
        fs::write(input.path().join("sites.shp"), b"").unwrap();

        let args = directory_args(input.path(), output.path());
        let err = process_directory(input.path(), &args).unwrap_err();
        assert!(err.to_string().contains("claimed by more than one input"), "{}", err);
        assert!(!output.path().join("sites.csv").exists());
    }

    #[test]
    fn test_collect_input_files_is_recursive_and_sorted() {
        let input = TempDir::new().unwrap();
        fs::create_dir_all(input.path().join("b")).unwrap();
        fs::write(input.path().join("b").join("z.gml"), "").unwrap();
        fs::write(input.path().join("a.SHP"), "").unwrap();
        fs::write(input.path().join("c.csv"), "").unwrap();

        let files = collect_input_files(input.path()).unwrap();
        let names: Vec<PathBuf> = files
            .iter()
            .map(|(path, _)| path.strip_prefix(input.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(names, vec![PathBuf::from("a.SHP"), Path::new("b").join("z.gml")]);
        assert!(matches!(files[0].1, FileType::Shapefile));
    }

    #[test]
    fn test_mirrored_output_dir() {
        let out = mirrored_output_dir(Path::new("in/north/sites.gml"), Path::new("in"), Path::new("out"));
        assert_eq!(out, Path::new("out").join("north"));
        let top = mirrored_output_dir(Path::new("in/sites.gml"), Path::new("in"), Path::new("out"));
        assert_eq!(top, PathBuf::from("out"));
    }
}
