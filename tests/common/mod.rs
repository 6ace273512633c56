#![allow(dead_code)]

use sievex::query::attribute::Attribute;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Car {
    pub id: u32,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub color: &'static str,
    pub doors: i32,
    pub price: u32,
    pub features: Vec<&'static str>,
}

pub const MODELS: [(&str, &str); 10] = [
    ("Ford", "Focus"),
    ("Ford", "Fusion"),
    ("Ford", "Taurus"),
    ("Honda", "Civic"),
    ("Honda", "Insight"),
    ("Honda", "Accord"),
    ("Toyota", "Avensis"),
    ("Toyota", "Prius"),
    ("Toyota", "Hilux"),
    ("BMW", "M6"),
];

const COLORS: [&str; 4] = ["red", "green", "blue", "white"];
const FEATURES: [&str; 5] = ["sunroof", "radio", "gps", "spare tyre", "parking sensors"];

/// 20 cars, two of each model
pub fn cars() -> Vec<Car> {
    (0..20u32).map(car).collect()
}

pub fn car(id: u32) -> Car {
    let (manufacturer, model) = MODELS[(id % 10) as usize];
    Car {
        id,
        manufacturer,
        model,
        color: COLORS[(id % 4) as usize],
        doors: if id % 3 == 0 { 2 } else { 4 },
        price: 5000 + (id * 750) % 9000,
        features: FEATURES.iter().copied().skip((id % 5) as usize).take((id % 3) as usize).collect(),
    }
}

pub fn car_id() -> Attribute<Car> {
    Attribute::simple("id", |c: &Car| c.id)
}

pub fn manufacturer() -> Attribute<Car> {
    Attribute::simple("manufacturer", |c: &Car| c.manufacturer)
}

pub fn model() -> Attribute<Car> {
    Attribute::simple("model", |c: &Car| c.model)
}

pub fn color() -> Attribute<Car> {
    Attribute::simple("color", |c: &Car| c.color)
}

pub fn doors() -> Attribute<Car> {
    Attribute::simple("doors", |c: &Car| c.doors)
}

pub fn price() -> Attribute<Car> {
    Attribute::simple("price", |c: &Car| c.price)
}

pub fn features() -> Attribute<Car> {
    Attribute::multi("features", |c: &Car| c.features.clone())
}
