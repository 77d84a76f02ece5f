fn main() {
    println!("{:?}", jiff::Timestamp::MAX);
    println!("{}", jiff::Timestamp::MAX.as_second());
}
