#![allow(dead_code)]

use std::future::IntoFuture;
use std::path::{Path, PathBuf};

use axum::Router;
use tokio::net::TcpListener;

/// Binds an ephemeral port and returns its base URL plus the listener.
pub async fn bind() -> (String, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    (format!("http://{}", addr), listener)
}

pub fn serve(listener: TcpListener, router: Router) {
    tokio::spawn(axum::serve(listener, router).into_future());
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32, rgb: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::from_pixel(width, height, image::Rgb(rgb))
        .save(&path)
        .expect("write png");
    path
}
