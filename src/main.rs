fn main() {
    aquaguard_lib::run()
}
