//! 病灶 patch 批量提取入口.

use clap::Parser;

mod cli;

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .expect("初始化日志失败");

    std::process::exit(cli::Cli::parse().run());
}
