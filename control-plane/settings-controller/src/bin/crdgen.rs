use kube::core::CustomResourceExt;
use settings_controller::crd::{settings::Settings, widget::Widget};

fn main() -> anyhow::Result<()> {
    for crd in [Settings::crd(), Widget::crd()] {
        println!("---");
        println!("{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
