pub mod json;
pub mod table;

use crate::archive::PassReport;

pub fn print(report: &PassReport, json_output: bool) {
    if json_output {
        println!("{}", json::render(report));
    } else {
        print!("{}", table::render(report));
    }
}
