use anyhow::Error;
use clap::{Parser, Subcommand};
use model::{clock::Clock, init_logging, schedule::Release, store, store::Store};
use std::fs;
use std::path::{Path, PathBuf};

mod all_anime;
mod html;
mod index;
mod rankings;

/// Render the tracker's static pages from the data directory.
#[derive(Clone, Debug, Parser)]
struct Options {
    /// Directory to write the pages to.
    #[clap(short, long, env = "ANIME_TRACKER_SITE_DIR", name = "DIR", default_value = ".")]
    out: PathBuf,

    #[clap(flatten)]
    store: store::Options,

    #[clap(subcommand)]
    page: Option<Page>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Subcommand)]
enum Page {
    /// The tracker page, index.html.
    Index,
    /// The combined rankings, rankings.html.
    Rankings,
    /// The catalog browser, all-anime.html.
    AllAnime,
    /// Every page.
    #[default]
    All,
}

fn write_page(out: &Path, file: &str, html: String) -> Result<(), Error> {
    let path = out.join(file);
    fs::write(&path, html)
        .map_err(|err| Error::msg(format!("unable to write {}: {err}", path.display())))?;
    tracing::info!("generated {}", path.display());
    Ok(())
}

fn generate(page: Page, store: &Store, out: &Path, clock: &Clock) -> Result<(), Error> {
    fs::create_dir_all(out)?;
    if matches!(page, Page::Index | Page::All) {
        let data = index::IndexData::load(store)?;
        write_page(out, "index.html", index::render(&data)?)?;
    }
    if matches!(page, Page::Rankings | Page::All) {
        let releases: Vec<Release> = store.load(store::ANIME_DATA)?;
        write_page(out, "rankings.html", rankings::render(&releases)?)?;
    }
    if matches!(page, Page::AllAnime | Page::All) {
        let catalog = all_anime::load(store)?;
        tracing::info!("loaded {} anime from catalog", catalog.len());
        write_page(out, "all-anime.html", all_anime::render(&catalog, clock)?)?;
    }
    Ok(())
}

fn main() -> Result<(), Error> {
    init_logging();
    let opt = Options::parse();
    let store = opt.store.open()?;
    generate(opt.page.unwrap_or_default(), &store, &opt.out, &Clock::now())
}
