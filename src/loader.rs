// loader.rs — 后台线程解码全景图，结果经通道送回渲染线程

use image::io::Reader as ImageReader;
use image::RgbaImage;
use panorama_tour::{Result, ViewerError};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

pub struct LoadedTexture {
    pub scene_id: String,
    pub image: Result<RgbaImage>,
}

pub struct TextureLoader {
    tx: Sender<LoadedTexture>,
    rx: Receiver<LoadedTexture>,
    // 相对路径的基准目录（导览文件所在目录）
    base_dir: PathBuf,
}

impl TextureLoader {
    pub fn new(base_dir: PathBuf) -> Self {
        let (tx, rx) = channel();
        Self { tx, rx, base_dir }
    }

    pub fn set_base_dir(&mut self, base_dir: PathBuf) {
        self.base_dir = base_dir;
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }

    pub fn load(&self, scene_id: String, path: PathBuf) {
        let tx = self.tx.clone();
        thread::spawn(move || {
            log::info!("loading panorama {} in background", path.display());
            let image = decode(&path);
            if let Ok(img) = &image {
                log::info!("decoded {}x{} from {}", img.width(), img.height(), path.display());
            }
            if tx.send(LoadedTexture { scene_id, image }).is_err() {
                log::error!("render thread is gone, dropping {}", path.display());
            }
        });
    }

    pub fn try_recv(&self) -> Option<LoadedTexture> {
        self.rx.try_recv().ok()
    }
}

fn decode(path: &Path) -> Result<RgbaImage> {
    let reader = BufReader::new(File::open(path)?);
    let mut reader = ImageReader::new(reader).with_guessed_format()?;
    reader.no_limits();
    let img = reader.decode().map_err(ViewerError::from)?;
    Ok(img.to_rgba8())
}
