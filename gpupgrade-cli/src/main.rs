use structopt::StructOpt;

use gpupgrade_cli::Gpupgrade;
use gpupgrade_core::step::is_user_stop;

#[tokio::main]
async fn main() {
    if let Err(err) = Gpupgrade::from_args().run().await {
        if is_user_stop(&err) {
            return;
        }
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
